//! libsql storage for components and relationships.
mod connection;
mod queries;

pub use connection::Database;
