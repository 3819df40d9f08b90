//! Local app API.
//!
//! Exposes the client operations and views as JSON endpoints for a thin
//! web shell. Routes are nested under `/app/`; view routes sit behind a
//! loading gate until the identity provider has reported.
//!
//! The router is composable — `app_router()` returns a `Router` that can
//! be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::app_router;
pub use server::{start_app_server, AppServer, AppServerSession, ServerError};
pub use types::ApiContext;
