pub mod classify;
pub mod graph;
pub mod lifting;
pub mod mapping;
pub mod state;
pub mod types;
