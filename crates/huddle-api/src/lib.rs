//! HTTP layer: sessions, authorization, REST handlers and the router.

pub mod auth;
pub mod companies;
pub mod config;
pub mod database;
pub mod device;
pub mod error;
pub mod extract;
pub mod guard;
pub mod meetings;
pub mod messages;
pub mod provisioner;
pub mod router;
pub mod seed;
pub mod session;
pub mod state;
pub mod stats;
pub mod users;
pub mod voice;

pub use config::Config;
pub use error::AppError;
pub use state::{AppState, AppStateInner};
