//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP or unix socket connection
//!     → server.rs (Axum setup, middleware, in-flight tracking)
//!     → request.rs (query parameters, body decoding)
//!     → handlers.rs (format, liveness, encoding, stop, status)
//!     → dispatch layer
//!     → response.rs (status code, body, charset)
//!     → Send to client
//! ```
//!
//! # Endpoints
//! - `POST /?path=<path>[&dryrun]` with the file content as body
//! - `GET /` liveness
//! - `GET /encoding?path=<path>`
//! - `POST /stop`
//! - `GET /status`
//!
//! Trailing slashes are ignored (`/stop/` is `/stop`).

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use handlers::DaemonStatus;
pub use request::X_REQUEST_ID;
pub use server::{AppState, DaemonServer};
