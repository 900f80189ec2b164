#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod actuators;
pub mod error;
pub mod kinematics;
pub mod machine;
pub mod port;
pub mod sensors;
pub mod timer;

pub use actuators::effector::{EffectorAction, EffectorDevice, EffectorError};
pub use actuators::gate::{GateAction, GateConfig, GateDevice, GateError};
pub use actuators::led::{LedAction, LedDevice, LedError};
pub use actuators::Actuator;
pub use kinematics::{
    angle_to_step, Arm, DeltaDimensions, DeltaKinematics, JointAngles, KinematicsError, Pose,
};
pub use machine::{SortPlan, SorterError, SorterMachine, SorterState};
pub use port::{lines, OutputPort, PinPort, PinPortError};
pub use sensors::colour::{Colour, ColourAction, ColourDevice, ColourError, ColourReader};
pub use sensors::switch::{
    SwitchActiveHigh, SwitchActiveLow, SwitchDevice, SwitchStatus, SwitchUpdate,
};
pub use sensors::Sensor;
pub use timer::{ClockChannel, SystemClock};
