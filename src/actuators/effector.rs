use core::fmt::Debug;
use core::task::Poll;
use defmt::Format;
use embedded_hal::blocking::delay::DelayUs;

use super::Actuator;
use crate::error::Error;
use crate::kinematics::{DeltaKinematics, KinematicsError, Pose};
use crate::port::{lines, OutputPort};

/// How long each step pulse is held high.
const STEP_PULSE_DWELL_US: u32 = 100;

/// One stepper channel's fixed port lines.
#[derive(Clone, Copy)]
struct MotorLines {
    step: u8,
    dir: u8,
}

const MOTORS: [MotorLines; 3] = [
    MotorLines {
        step: lines::MOTOR1_STEP,
        dir: lines::MOTOR1_DIR,
    },
    MotorLines {
        step: lines::MOTOR2_STEP,
        dir: lines::MOTOR2_DIR,
    },
    MotorLines {
        step: lines::MOTOR3_STEP,
        dir: lines::MOTOR3_DIR,
    },
];

#[derive(Clone, Copy, Debug, Format, PartialEq)]
pub enum EffectorAction {
    /// Solve the pose and move there. Unreachable poses fail before any
    /// line is touched.
    MoveTo { pose: Pose },
    /// Move straight to per-motor step targets. Reachability must have been
    /// validated upstream.
    MoveSteps { targets: [i32; 3] },
    SetPump { is_on: bool },
    /// Declare the current physical position to be step zero on all motors.
    ResetHome,
}

#[derive(Clone, Copy, Debug)]
pub enum EffectorError<PortError: Debug> {
    Port(PortError),
    Kinematics(KinematicsError),
}

impl<PortError: Debug> Error for EffectorError<PortError> {}

/// Drives the three delta-arm steppers (and the vacuum pump) through the
/// shared output port.
///
/// The device keeps the only copy of each motor's logical step position.
/// Control is open loop: the counters track commanded pulses, not measured
/// position, and start at zero on the assumption that the arms are at the
/// physical home. [`EffectorDevice::reset_home`] re-anchors them after a
/// manual homing.
pub struct EffectorDevice<Port, Delay>
where
    Port: OutputPort,
    Delay: DelayUs<u32>,
{
    port: Port,
    delay: Delay,
    kinematics: DeltaKinematics,
    current_steps: [i32; 3],
    pending: Option<EffectorAction>,
}

impl<Port, Delay> EffectorDevice<Port, Delay>
where
    Port: OutputPort,
    Delay: DelayUs<u32>,
{
    pub fn new(port: Port, delay: Delay, kinematics: DeltaKinematics) -> Self {
        Self {
            port,
            delay,
            kinematics,
            current_steps: [0; 3],
            pending: None,
        }
    }

    pub fn current_steps(&self) -> [i32; 3] {
        self.current_steps
    }

    /// Zeroes the logical step counters. Only meaningful with the arms
    /// physically parked at home.
    pub fn reset_home(&mut self) {
        self.current_steps = [0; 3];
    }

    pub fn set_pump(&mut self, is_on: bool) -> Result<(), EffectorError<Port::Error>> {
        match is_on {
            true => self.port.set(lines::PUMP),
            false => self.port.clear(lines::PUMP),
        }
        .map_err(EffectorError::Port)
    }

    /// Solves the pose and runs the coordinated move.
    ///
    /// Reachability is settled before any motor line is touched; an
    /// unreachable pose leaves the mechanism exactly where it was.
    pub fn move_to(&mut self, pose: &Pose) -> Result<(), EffectorError<Port::Error>> {
        let targets = self
            .kinematics
            .pose_to_steps(pose)
            .map_err(EffectorError::Kinematics)?;

        self.move_to_steps(targets)
    }

    /// Steps all three motors from their current logical positions to
    /// `targets`, arriving together.
    ///
    /// Two phases: every direction line is committed first, then all motors
    /// short of their target are pulsed in lock-step until none remain.
    /// Blocks until the move completes; there is no cancellation. Step
    /// targets are taken as-is; callers derive them from a validated pose.
    pub fn move_to_steps(&mut self, targets: [i32; 3]) -> Result<(), EffectorError<Port::Error>> {
        let current = self.current_steps;
        for index in 0..3 {
            self.set_direction(MOTORS[index], current[index], targets[index])
                .map_err(EffectorError::Port)?;
        }

        // power the drivers only once every direction is committed
        self.port
            .clear(lines::MOTOR_DISABLE)
            .map_err(EffectorError::Port)?;

        loop {
            let mut pulse_mask = 0u8;

            for index in 0..3 {
                if self.current_steps[index] == targets[index] {
                    continue;
                }

                pulse_mask |= MOTORS[index].step;

                // the committed direction line decides which way the logical
                // counter walks: high = decrease
                let dir_is_high = self
                    .port
                    .read(MOTORS[index].dir)
                    .map_err(EffectorError::Port)?
                    != 0;
                self.current_steps[index] += if dir_is_high { -1 } else { 1 };
            }

            if pulse_mask == 0 {
                break;
            }

            self.pulse(pulse_mask)?;
        }

        self.port
            .set(lines::MOTOR_DISABLE)
            .map_err(EffectorError::Port)
    }

    /// Low = step count increases while pulsing, high = decreases. A motor
    /// already at target keeps whatever direction it last had.
    fn set_direction(
        &mut self,
        motor: MotorLines,
        current: i32,
        target: i32,
    ) -> Result<(), Port::Error> {
        if current < target {
            self.port.clear(motor.dir)
        } else if current > target {
            self.port.set(motor.dir)
        } else {
            Ok(())
        }
    }

    /// One simultaneous pulse to every step line in `mask`.
    fn pulse(&mut self, mask: u8) -> Result<(), EffectorError<Port::Error>> {
        self.port.set(mask).map_err(EffectorError::Port)?;
        self.delay.delay_us(STEP_PULSE_DWELL_US);
        self.port.clear(mask).map_err(EffectorError::Port)
    }
}

impl<Port, Delay> Actuator for EffectorDevice<Port, Delay>
where
    Port: OutputPort,
    Port::Error: Debug,
    Delay: DelayUs<u32>,
{
    type Action = EffectorAction;
    type Error = EffectorError<Port::Error>;

    fn run(&mut self, action: &Self::Action) {
        self.pending = Some(*action);
    }

    fn poll(&mut self) -> Poll<Result<(), Self::Error>> {
        let action = match self.pending.take() {
            Some(action) => action,
            None => return Poll::Ready(Ok(())),
        };

        // a move runs to completion inside a single poll: the mechanism must
        // never be left between pulse groups
        let result = match action {
            EffectorAction::MoveTo { pose } => self.move_to(&pose),
            EffectorAction::MoveSteps { targets } => self.move_to_steps(targets),
            EffectorAction::SetPump { is_on } => self.set_pump(is_on),
            EffectorAction::ResetHome => {
                self.reset_home();
                Ok(())
            }
        };

        Poll::Ready(result)
    }
}
