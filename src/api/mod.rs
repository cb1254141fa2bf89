//! API Module
//!
//! HTTP handlers and routing for the diagnostics surface.
//!
//! # Endpoints
//! - `GET /health` - Component health
//! - `GET /errors`, `GET /errors/unresolved`, `GET /errors/stats` - Error log views
//! - `POST /errors/:id/resolve` - Resolve an error log
//! - `GET /notifications` - Notification inbox
//! - `POST /maintenance` - Trigger cache maintenance

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
