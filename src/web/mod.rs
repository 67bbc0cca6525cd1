//! REST surface for the query builder

pub mod server;

pub use server::start_server;
