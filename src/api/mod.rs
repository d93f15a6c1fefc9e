//! API Module
//!
//! HTTP handlers and routing for the cache host.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value with options
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Remove a key
//! - `POST /invalidate/tags` - Remove entries sharing any tag
//! - `POST /invalidate/pattern` - Remove entries whose key matches a regex
//! - `POST /clear` - Remove everything
//! - `GET /stats`, `GET /status` - Statistics and health summary
//! - `POST /optimize` - Run a sweep, trim and re-compression pass
//! - `POST /backup`, `POST /restore` - Snapshot management
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
