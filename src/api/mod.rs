//! HTTP surface: producer triggers, notification config CRUD, health/stats.

mod handlers;
mod health;
mod models;
mod routes;

pub use routes::api_routes;
