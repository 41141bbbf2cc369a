pub mod admin;
pub mod app;
pub mod authz;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod jwt;
pub mod models;
pub mod routes;
pub mod seed;
pub mod store;
pub mod utils;

// Re-export commonly used items for tests
pub use app::create_app;
