//! Vendor adapters for the pieceflow trigger controllers.
//!
//! Each adapter receives its base URL and credentials through
//! [`PieceConfig`] and implements one of the seams from
//! `pieceflow-triggers`.

pub mod attio;
pub mod config;
pub mod http;
pub mod kommo;
pub mod meistertask;
pub mod vimeo;

pub use attio::AttioWebhooks;
pub use config::{PieceAuth, PieceConfig, PieceConfigError};
pub use http::VendorClient;
pub use kommo::{KommoStatuses, KommoWebhooks};
pub use meistertask::MeisterTaskTasks;
pub use vimeo::VimeoVideos;
