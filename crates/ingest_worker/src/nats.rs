mod sensor_event_consumer;
mod sensor_event_service;

pub use sensor_event_consumer::*;
pub use sensor_event_service::*;
