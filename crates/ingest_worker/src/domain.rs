mod entry_writer;
mod orientation;
mod reading_ingest_service;
mod risk_aggregator;

pub use entry_writer::*;
pub use orientation::*;
pub use reading_ingest_service::*;
pub use risk_aggregator::*;
