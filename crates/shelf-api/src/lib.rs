//! HTTP surface for the shelf engine.
//!
//! This crate provides:
//! - `router` - the axum `Router` with every public and admin route
//! - `AppState` - shared services behind the handlers
//! - `ApiError` - mapping from the engine's error taxonomy to HTTP responses
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_api::{router, AppState};
//!
//! let state = AppState::from_config(&config, kv_store, clock)?;
//! let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
//! axum::serve(listener, router(state, &config.server)).await?;
//! ```

mod error;
mod handlers;
mod middleware;
mod router;
mod state;

pub use error::ApiError;
pub use handlers::client_ip;
pub use router::router;
pub use state::AppState;
