pub mod effector;
pub mod gate;
pub mod led;

use core::task::Poll;

use crate::error::Error;

// receive inspired by https://github.com/rtic-rs/rfcs/pull/0052
pub trait Actuator {
    type Action;
    type Error: Error;

    /// Latches an action; the work happens across subsequent `poll` calls.
    fn run(&mut self, action: &Self::Action);

    /// Drives the latched action; `Poll::Ready` when the device is idle
    /// again.
    fn poll(&mut self) -> Poll<Result<(), Self::Error>>;
}
