use core::fmt::Debug;
use embedded_hal::digital::v2::OutputPin;

use crate::error::Error;

/// Fixed bit assignments on the motor output port.
///
/// The port drives the motor stack as one 8-bit register: three step-pulse
/// lines, three direction lines, the shared driver enable (active low), and
/// the vacuum pump.
pub mod lines {
    pub const MOTOR1_STEP: u8 = 0b0000_0001;
    pub const MOTOR1_DIR: u8 = 0b0000_0010;
    pub const MOTOR2_STEP: u8 = 0b0000_0100;
    pub const MOTOR2_DIR: u8 = 0b0000_1000;
    pub const MOTOR3_STEP: u8 = 0b0001_0000;
    pub const MOTOR3_DIR: u8 = 0b0010_0000;
    /// High = motor drivers disabled.
    pub const MOTOR_DISABLE: u8 = 0b0100_0000;
    pub const PUMP: u8 = 0b1000_0000;
}

/// Bit-masked access to the single output register that owns every motor
/// control line.
///
/// The effector device holds the port exclusively for the duration of a
/// move; nothing else writes these lines while motors are stepping.
pub trait OutputPort {
    type Error: Debug;

    /// Drives every line in `mask` high.
    fn set(&mut self, mask: u8) -> Result<(), Self::Error>;

    /// Drives every line in `mask` low.
    fn clear(&mut self, mask: u8) -> Result<(), Self::Error>;

    /// Inverts every line in `mask`.
    fn toggle(&mut self, mask: u8) -> Result<(), Self::Error>;

    /// Returns the commanded state of the lines in `mask`.
    fn read(&mut self, mask: u8) -> Result<u8, Self::Error>;
}

#[derive(Clone, Copy, Debug)]
pub enum PinPortError<PinError: Debug> {
    Pin(PinError),
}

impl<PinError: Debug> Error for PinPortError<PinError> {}

/// An [`OutputPort`] fanned out over eight discrete GPIO pins.
///
/// Boards without a raw 8-bit output register use this; a shadow byte keeps
/// `read` working since the pins themselves are write-only.
pub struct PinPort<Step1, Dir1, Step2, Dir2, Step3, Dir3, Disable, Pump> {
    motor1_step: Step1,
    motor1_dir: Dir1,
    motor2_step: Step2,
    motor2_dir: Dir2,
    motor3_step: Step3,
    motor3_dir: Dir3,
    motor_disable: Disable,
    pump: Pump,
    shadow: u8,
}

impl<PinError, Step1, Dir1, Step2, Dir2, Step3, Dir3, Disable, Pump>
    PinPort<Step1, Dir1, Step2, Dir2, Step3, Dir3, Disable, Pump>
where
    PinError: Debug,
    Step1: OutputPin<Error = PinError>,
    Dir1: OutputPin<Error = PinError>,
    Step2: OutputPin<Error = PinError>,
    Dir2: OutputPin<Error = PinError>,
    Step3: OutputPin<Error = PinError>,
    Dir3: OutputPin<Error = PinError>,
    Disable: OutputPin<Error = PinError>,
    Pump: OutputPin<Error = PinError>,
{
    /// Takes ownership of the line pins and drives them to the reset state:
    /// everything low except `MOTOR_DISABLE`, so the motors stay unpowered
    /// until a move begins.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        motor1_step: Step1,
        motor1_dir: Dir1,
        motor2_step: Step2,
        motor2_dir: Dir2,
        motor3_step: Step3,
        motor3_dir: Dir3,
        motor_disable: Disable,
        pump: Pump,
    ) -> Result<Self, PinPortError<PinError>> {
        let mut port = Self {
            motor1_step,
            motor1_dir,
            motor2_step,
            motor2_dir,
            motor3_step,
            motor3_dir,
            motor_disable,
            pump,
            shadow: lines::MOTOR_DISABLE,
        };
        port.apply(0xFF)?;

        Ok(port)
    }

    /// Drives every pin in `mask` to its shadow value.
    fn apply(&mut self, mask: u8) -> Result<(), PinPortError<PinError>> {
        let shadow = self.shadow;
        let targets: [(u8, &mut dyn OutputPin<Error = PinError>); 8] = [
            (lines::MOTOR1_STEP, &mut self.motor1_step),
            (lines::MOTOR1_DIR, &mut self.motor1_dir),
            (lines::MOTOR2_STEP, &mut self.motor2_step),
            (lines::MOTOR2_DIR, &mut self.motor2_dir),
            (lines::MOTOR3_STEP, &mut self.motor3_step),
            (lines::MOTOR3_DIR, &mut self.motor3_dir),
            (lines::MOTOR_DISABLE, &mut self.motor_disable),
            (lines::PUMP, &mut self.pump),
        ];

        for (line, pin) in targets {
            if mask & line == 0 {
                continue;
            }

            match shadow & line != 0 {
                true => pin.set_high(),
                false => pin.set_low(),
            }
            .map_err(PinPortError::Pin)?;
        }

        Ok(())
    }
}

impl<PinError, Step1, Dir1, Step2, Dir2, Step3, Dir3, Disable, Pump> OutputPort
    for PinPort<Step1, Dir1, Step2, Dir2, Step3, Dir3, Disable, Pump>
where
    PinError: Debug,
    Step1: OutputPin<Error = PinError>,
    Dir1: OutputPin<Error = PinError>,
    Step2: OutputPin<Error = PinError>,
    Dir2: OutputPin<Error = PinError>,
    Step3: OutputPin<Error = PinError>,
    Dir3: OutputPin<Error = PinError>,
    Disable: OutputPin<Error = PinError>,
    Pump: OutputPin<Error = PinError>,
{
    type Error = PinPortError<PinError>;

    fn set(&mut self, mask: u8) -> Result<(), Self::Error> {
        self.shadow |= mask;
        self.apply(mask)
    }

    fn clear(&mut self, mask: u8) -> Result<(), Self::Error> {
        self.shadow &= !mask;
        self.apply(mask)
    }

    fn toggle(&mut self, mask: u8) -> Result<(), Self::Error> {
        self.shadow ^= mask;
        self.apply(mask)
    }

    fn read(&mut self, mask: u8) -> Result<u8, Self::Error> {
        Ok(self.shadow & mask)
    }
}
