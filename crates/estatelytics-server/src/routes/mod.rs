pub mod health;
pub mod providers;
pub mod reports;
