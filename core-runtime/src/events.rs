//! # Event Bus System
//!
//! Provides an event-driven architecture for the federation core using
//! `tokio::sync::broadcast`. This module enables decoupled communication
//! between core modules through typed events.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for different domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//! - **Subscription Management**: Multiple subscribers can listen independently
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Accounts Mod ├──────────────>│           │
//! └──────────────┘               │ EventBus  │
//!                                │ (broadcast│     subscribe    ┌────────────┐
//! ┌──────────────┐     emit      │  channel) ├─────────────────>│ Subscriber │
//! │ Federation   ├──────────────>│           │                  └────────────┘
//! └──────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ### Creating an Event Bus
//!
//! ```rust
//! use core_runtime::events::EventBus;
//!
//! let event_bus = EventBus::new(100); // Buffer size of 100 events
//! ```
//!
//! ### Publishing Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, AccountEvent};
//!
//! # let event_bus = EventBus::new(100);
//! let event = CoreEvent::Account(AccountEvent::Connected {
//!     user_id: "user-123".to_string(),
//!     provider: "google_drive".to_string(),
//!     provider_account_id: None,
//! });
//!
//! event_bus.emit(event).ok();
//! ```
//!
//! ### Subscribing to Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent};
//! use tokio::sync::broadcast::error::RecvError;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! tokio::spawn(async move {
//!     loop {
//!         match stream.recv().await {
//!             Ok(event) => println!("Received: {:?}", event),
//!             Err(RecvError::Lagged(n)) => {
//!                 eprintln!("Missed {} events", n);
//!             }
//!             Err(RecvError::Closed) => break,
//!         }
//!     }
//! });
//! # }
//! ```
//!
//! ## Error Handling
//!
//! The event bus uses `tokio::sync::broadcast`, which can produce two types
//! of errors:
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n`
//!   events. This is non-fatal; the subscriber can continue receiving new
//!   events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates
//!   shutdown.
//!
//! Emission is fire-and-forget: publishers ignore the "no subscribers" error
//! (`let _ = bus.emit(...)`), so embedders that never subscribe pay nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// This value balances memory usage with the ability to handle bursts of
/// events. Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
///
/// This is the main event type published and received through the event bus.
/// It wraps domain-specific event types for different modules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Account and token lifecycle events
    Account(AccountEvent),
    /// Federated operation events
    Federation(FederationEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Account(e) => e.description(),
            CoreEvent::Federation(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Account(AccountEvent::RefreshFailed { .. }) => EventSeverity::Error,
            CoreEvent::Account(AccountEvent::Connected { .. }) => EventSeverity::Info,
            CoreEvent::Federation(FederationEvent::SearchCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Federation(FederationEvent::UploadCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Account Events
// ============================================================================

/// Events related to external accounts and token lifecycle.
///
/// `user_id` and `provider` are carried as plain strings so hosts can consume
/// events without depending on the accounts crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AccountEvent {
    /// A provider account was connected (or reconnected) for a user.
    Connected {
        /// The owning user.
        user_id: String,
        /// The provider identifier (e.g., "dropbox", "google_drive").
        provider: String,
        /// The provider-side account ID, when known.
        provider_account_id: Option<String>,
    },
    /// A provider account was removed.
    Disconnected {
        /// The owning user.
        user_id: String,
        /// The provider identifier.
        provider: String,
    },
    /// Access token is being refreshed.
    TokenRefreshing {
        /// The owning user.
        user_id: String,
        /// The provider identifier.
        provider: String,
    },
    /// Token refresh completed successfully.
    TokenRefreshed {
        /// The owning user.
        user_id: String,
        /// The provider identifier.
        provider: String,
        /// When the new access token expires.
        expires_at: DateTime<Utc>,
    },
    /// Token refresh failed.
    RefreshFailed {
        /// The owning user.
        user_id: String,
        /// The provider identifier.
        provider: String,
        /// Human-readable error message.
        message: String,
    },
}

impl AccountEvent {
    fn description(&self) -> &str {
        match self {
            AccountEvent::Connected { .. } => "Provider account connected",
            AccountEvent::Disconnected { .. } => "Provider account disconnected",
            AccountEvent::TokenRefreshing { .. } => "Refreshing access token",
            AccountEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AccountEvent::RefreshFailed { .. } => "Token refresh failed",
        }
    }
}

// ============================================================================
// Federation Events
// ============================================================================

/// Events related to federated operations across providers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum FederationEvent {
    /// A federated search finished (possibly with partial failures).
    SearchCompleted {
        /// The normalized query that was dispatched.
        query: String,
        /// Total files found across all providers.
        total_files: usize,
        /// Providers whose leg failed (empty when fully successful).
        failed_providers: Vec<String>,
    },
    /// A federated listing finished (possibly with partial failures).
    ListingCompleted {
        /// Total files listed across all providers.
        total_files: usize,
        /// Providers whose leg failed (empty when fully successful).
        failed_providers: Vec<String>,
    },
    /// A file was uploaded to a provider.
    UploadCompleted {
        /// The provider identifier.
        provider: String,
        /// The uploaded file name.
        file_name: String,
        /// The provider-assigned file ID.
        file_id: String,
    },
}

impl FederationEvent {
    fn description(&self) -> &str {
        match self {
            FederationEvent::SearchCompleted { .. } => "Federated search completed",
            FederationEvent::ListingCompleted { .. } => "Federated listing completed",
            FederationEvent::UploadCompleted { .. } => "File uploaded",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, CoreEvent, AccountEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
///
/// // Subscribe to events
/// let mut subscriber = event_bus.subscribe();
///
/// // Emit an event
/// let event = CoreEvent::Account(AccountEvent::Connected {
///     user_id: "user-123".to_string(),
///     provider: "dropbox".to_string(),
///     provider_account_id: Some("dbid:abc".to_string()),
/// });
/// event_bus.emit(event).ok();
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future
    /// events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering
/// capabilities.
///
/// This provides a more ergonomic API for consuming events with optional
/// filtering by event type or severity.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
/// let stream = EventStream::new(event_bus.subscribe());
///
/// // Filter for account events only
/// let mut account_stream = stream.filter(|event| {
///     matches!(event, CoreEvent::Account(_))
/// });
/// # }
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// This will skip events that don't match the filter and return the next
    /// matching event.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n`
    /// events. Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }

            // Event didn't match filter, continue to next event
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }

                    // Event didn't match filter, continue
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
