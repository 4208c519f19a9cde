mod clock;
mod device_state;
mod entry;
mod result;
mod sensor_event;

pub use clock::*;
pub use device_state::*;
pub use entry::*;
pub use result::*;
pub use sensor_event::*;
