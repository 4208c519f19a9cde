mod client;
mod config;
mod device_state_repository;
mod entry_repository;
mod schema;

pub use client::*;
pub use config::*;
pub use device_state_repository::*;
pub use entry_repository::*;
pub use schema::*;
