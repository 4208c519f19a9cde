mod consumer_logging;
mod consumer_tracing;
mod types;

pub use consumer_logging::*;
pub use consumer_tracing::*;
pub use types::*;
