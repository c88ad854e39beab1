pub mod config;
pub mod error;
pub mod handlers;
pub mod logger;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;
