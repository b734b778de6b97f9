//! HTTP surface for the firewall gate
//!
//! A deliberately small axum router:
//!
//! - `GET /firewall/status` - current mode token
//! - `GET /firewall/maintenance` - request the move into maintenance
//! - `GET /firewall/production` - request the move into production
//!
//! Nothing is ever served at the root path.

pub mod routes;
pub mod server;

pub use routes::firewall_router;
pub use server::{ServeOutcome, serve};
