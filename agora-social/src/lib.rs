pub mod app;
pub mod avatar;
pub mod config;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

pub use app::{build_router, AppState, RouterOptions};
