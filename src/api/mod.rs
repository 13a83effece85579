//! API Module
//!
//! HTTP admin surface over the runtime components.
//!
//! # Endpoints
//! - `PUT /cache/:name`, `GET /cache/:name/:key`, `GET /cache/:name/stats`
//! - `GET /tasks`, `POST /tasks`, `DELETE /tasks/:name`, `GET /tasks/:name/history`
//! - `GET /dashboard`, `POST /dashboard/{start,stop,pause,refresh}`
//! - `PUT /students`
//! - `POST /audit`, `GET /audit/stats`, `GET /audit/recent`
//! - `GET /runtime/pools`, `GET /health`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
