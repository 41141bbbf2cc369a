pub mod admin;
pub mod auth;
pub mod guard;
pub mod health;
