pub mod app;
pub mod config;
pub mod error;
pub mod providers;
pub mod report;
pub mod routes;
pub mod state;
