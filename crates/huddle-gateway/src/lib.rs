//! Best-effort real-time fan-out over WebSocket.
//!
//! Every text frame a client sends is relayed verbatim to all other live
//! connections. Server-side code can push `GatewayEvent`s to everyone. There
//! is no authentication, no per-tenant filtering and no persistence.

pub mod connection;
pub mod dispatcher;

pub use dispatcher::{ConnectionId, Dispatcher};
