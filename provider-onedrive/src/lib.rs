//! Microsoft OneDrive storage provider
//!
//! Connects to OneDrive through the Microsoft Graph API, covering the
//! personal drive and the document libraries of every SharePoint site the
//! account can reach. Folder trees are enumerated with an explicit
//! work-stack walk rather than recursion.

pub mod connector;
pub mod types;
pub mod walker;

pub use connector::OneDriveConnector;
pub use walker::DriveWalker;
