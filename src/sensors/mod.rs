pub mod colour;
pub mod switch;

use crate::error::Error;

pub trait Sensor {
    type Message;
    type Error: Error;

    /// Polls the sensor, returning a message only when something changed.
    fn sense(&mut self) -> Result<Option<Self::Message>, Self::Error>;
}
