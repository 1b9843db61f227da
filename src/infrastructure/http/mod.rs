//! HTTP infrastructure module
//!
//! Server, shared state, routes, handlers and the filters they share.

pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod utils;

pub use server::HttpServer;
pub use state::AppState;
