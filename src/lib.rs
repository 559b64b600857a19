pub mod api;
pub mod app;
pub mod backends;
pub mod clients;
pub mod config;
pub mod error;
pub mod identifier;
pub mod middleware;
pub mod state;
pub mod tickets;
