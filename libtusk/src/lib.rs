//! Tusk - core of a Mastodon client
//!
//! This library holds everything below the user interface: a unidirectional
//! store (actions, slice reducers, subscriptions and effects), cursor
//! pagination shared by every list, list reconciliation for rendering, the
//! OAuth login state machine and credential storage.

pub mod actions;
pub mod client;
pub mod config;
pub mod credentials;
pub mod effects;
pub mod error;
pub mod logging;
pub mod pagination;
pub mod reconcile;
pub mod remote;
pub mod state;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use actions::{AccountContext, Action, PageTarget};
pub use client::TuskClient;
pub use config::Config;
pub use credentials::{AccountVault, CredentialStore};
pub use error::{Result, TuskError};
pub use pagination::{Direction, Page, PageCursor, PaginatingData};
pub use state::RootState;
pub use store::{Dispatcher, Store};
pub use types::{Account, Notification, Status};
