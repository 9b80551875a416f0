pub mod aggregate;
pub mod config;
pub mod error;
pub mod funnel;
pub mod kpi;
pub mod provider;
pub mod report;
pub mod synthetic;
pub mod window;
