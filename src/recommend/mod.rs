// candidate recommendation on top of the reflexion graph
pub mod attract;
pub mod cache;
pub mod config;
pub mod error;
pub mod handling;
pub mod host;
pub mod registry;
pub mod session;
