mod client;
mod middleware;
mod trace_context;
mod tower_consumer;
mod traits;

pub use client::*;
pub use middleware::*;
pub use trace_context::*;
pub use tower_consumer::*;
pub use traits::*;
