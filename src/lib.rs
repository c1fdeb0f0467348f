pub mod config;
pub mod db;
pub mod errors;
pub mod graphlink;
pub mod resolution;
pub mod store;
pub mod types;
