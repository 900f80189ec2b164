use core::fmt::Debug;
use core::task::Poll;
use defmt::Format;
use embedded_hal::serial::{Read, Write};

use crate::actuators::Actuator;
use crate::error::Error;

/// Byte sent to the analyser to request a classification.
const ANALYSE_REQUEST: u8 = b'a';

/// Chip colours the analyser can report, in bin order.
#[derive(Clone, Copy, Debug, Format, PartialEq, Eq)]
pub enum Colour {
    Red,
    Green,
    Blue,
    White,
    Black,
    Other,
}

impl Colour {
    pub const COUNT: usize = 6;

    /// One-byte wire code for each colour.
    fn from_code(code: u8) -> Option<Self> {
        match code {
            b'r' => Some(Colour::Red),
            b'g' => Some(Colour::Green),
            b'b' => Some(Colour::Blue),
            b'w' => Some(Colour::White),
            b'k' => Some(Colour::Black),
            b'o' => Some(Colour::Other),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Colour::Red => 0,
            Colour::Green => 1,
            Colour::Blue => 2,
            Colour::White => 3,
            Colour::Black => 4,
            Colour::Other => 5,
        }
    }
}

#[derive(Clone, Copy, Debug, Format, PartialEq, Eq)]
pub enum ColourAction {
    /// Ask the analyser to classify the chip under the camera.
    Analyse,
}

#[derive(Clone, Copy, Debug)]
pub enum ColourError<SerialError: Debug> {
    Write(SerialError),
    Read(SerialError),
    /// The analyser answered with a byte outside the colour alphabet.
    UnknownCode(u8),
}

impl<SerialError: Debug> Error for ColourError<SerialError> {}

/// Read access to the classification that last arrived over the link.
pub trait ColourReader {
    /// Takes the pending result; `Some` exactly once per completed analysis.
    fn take_colour(&mut self) -> Option<Colour>;
}

#[derive(Clone, Copy, Debug, Format)]
enum ColourStatus {
    Request,
    Await,
}

/// The firmware end of the serial link to the external colour analyser.
///
/// One request byte out, one code byte back; classification itself happens
/// on the other side of the wire.
pub struct ColourDevice<Serial>
where
    Serial: Write<u8> + Read<u8>,
{
    serial: Serial,
    status: Option<ColourStatus>,
    colour: Option<Colour>,
}

impl<Serial> ColourDevice<Serial>
where
    Serial: Write<u8> + Read<u8>,
{
    pub fn new(serial: Serial) -> Self {
        Self {
            serial,
            status: None,
            colour: None,
        }
    }
}

impl<Serial, SerialError> Actuator for ColourDevice<Serial>
where
    Serial: Write<u8, Error = SerialError> + Read<u8, Error = SerialError>,
    SerialError: Debug,
{
    type Action = ColourAction;
    type Error = ColourError<SerialError>;

    fn run(&mut self, action: &Self::Action) {
        match action {
            ColourAction::Analyse => {
                self.status = Some(ColourStatus::Request);
                self.colour = None;
            }
        }
    }

    fn poll(&mut self) -> Poll<Result<(), Self::Error>> {
        match self.status {
            None => Poll::Ready(Ok(())),
            Some(ColourStatus::Request) => match self.serial.write(ANALYSE_REQUEST) {
                Ok(()) => {
                    self.status = Some(ColourStatus::Await);

                    Poll::Pending
                }
                Err(nb::Error::WouldBlock) => Poll::Pending,
                Err(nb::Error::Other(err)) => {
                    self.status = None;

                    Poll::Ready(Err(ColourError::Write(err)))
                }
            },
            Some(ColourStatus::Await) => match self.serial.read() {
                Ok(code) => {
                    self.status = None;

                    match Colour::from_code(code) {
                        Some(colour) => {
                            self.colour = Some(colour);

                            Poll::Ready(Ok(()))
                        }
                        None => Poll::Ready(Err(ColourError::UnknownCode(code))),
                    }
                }
                Err(nb::Error::WouldBlock) => Poll::Pending,
                Err(nb::Error::Other(err)) => {
                    self.status = None;

                    Poll::Ready(Err(ColourError::Read(err)))
                }
            },
        }
    }
}

impl<Serial> ColourReader for ColourDevice<Serial>
where
    Serial: Write<u8> + Read<u8>,
{
    fn take_colour(&mut self) -> Option<Colour> {
        self.colour.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, PartialEq)]
    enum TestSerialError {
        Overrun,
    }

    #[derive(Default)]
    struct TestSerial {
        written: Vec<u8>,
        incoming: VecDeque<nb::Result<u8, TestSerialError>>,
    }

    impl Write<u8> for TestSerial {
        type Error = TestSerialError;

        fn write(&mut self, word: u8) -> nb::Result<(), TestSerialError> {
            self.written.push(word);
            Ok(())
        }

        fn flush(&mut self) -> nb::Result<(), TestSerialError> {
            Ok(())
        }
    }

    impl Read<u8> for TestSerial {
        type Error = TestSerialError;

        fn read(&mut self) -> nb::Result<u8, TestSerialError> {
            self.incoming
                .pop_front()
                .unwrap_or(Err(nb::Error::WouldBlock))
        }
    }

    #[test]
    fn analyse_requests_then_reads_the_code() {
        let mut device = ColourDevice::new(TestSerial::default());
        device.serial.incoming.push_back(Err(nb::Error::WouldBlock));
        device.serial.incoming.push_back(Ok(b'g'));

        device.run(&ColourAction::Analyse);

        assert!(matches!(device.poll(), Poll::Pending)); // request sent
        assert_eq!(device.serial.written, vec![b'a']);

        assert!(matches!(device.poll(), Poll::Pending)); // nothing back yet
        assert!(matches!(device.poll(), Poll::Ready(Ok(()))));

        assert_eq!(device.take_colour(), Some(Colour::Green));
        // consumed exactly once
        assert_eq!(device.take_colour(), None);
    }

    #[test]
    fn unknown_code_is_an_error_not_a_colour() {
        let mut device = ColourDevice::new(TestSerial::default());
        device.serial.incoming.push_back(Ok(b'z'));

        device.run(&ColourAction::Analyse);
        let _ = device.poll(); // request

        assert!(matches!(
            device.poll(),
            Poll::Ready(Err(ColourError::UnknownCode(b'z')))
        ));
        assert_eq!(device.take_colour(), None);
    }

    #[test]
    fn read_faults_propagate() {
        let mut device = ColourDevice::new(TestSerial::default());
        device
            .serial
            .incoming
            .push_back(Err(nb::Error::Other(TestSerialError::Overrun)));

        device.run(&ColourAction::Analyse);
        let _ = device.poll();

        assert!(matches!(
            device.poll(),
            Poll::Ready(Err(ColourError::Read(TestSerialError::Overrun)))
        ));
    }

    #[test]
    fn every_wire_code_maps_to_its_bin() {
        let codes = [
            (b'r', Colour::Red),
            (b'g', Colour::Green),
            (b'b', Colour::Blue),
            (b'w', Colour::White),
            (b'k', Colour::Black),
            (b'o', Colour::Other),
        ];

        for (code, colour) in codes {
            assert_eq!(Colour::from_code(code), Some(colour));
        }
        assert_eq!(Colour::from_code(b'x'), None);
    }
}
