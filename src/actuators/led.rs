use core::fmt::Debug;
use core::task::Poll;
use defmt::Format;
use embedded_hal::digital::v2::{OutputPin, PinState};
use fugit::TimerDurationU32 as TimerDuration;
use fugit_timer::Timer as FugitTimer;

use super::Actuator;
use crate::error::Error;

#[derive(Clone, Copy, Debug, Format)]
pub enum LedAction<const TIMER_HZ: u32> {
    Set { is_on: bool },
    Toggle,
    Blink { duration: TimerDuration<TIMER_HZ> },
}

#[derive(Clone, Copy, Debug, Format)]
enum LedBlinkStatus {
    Start,
    Wait,
}

#[derive(Clone, Copy, Debug, Format)]
enum LedState<const TIMER_HZ: u32> {
    Set {
        is_on: bool,
    },
    Blink {
        status: LedBlinkStatus,
        duration: TimerDuration<TIMER_HZ>,
    },
}

#[derive(Clone, Copy, Debug)]
pub enum LedError<PinError: Debug, TimerError: Debug> {
    PinSet(PinError),
    TimerStart(TimerError),
    TimerWait(TimerError),
}

impl<PinError: Debug, TimerError: Debug> Error for LedError<PinError, TimerError> {}

/// A status LED. The driven level is shadowed so `Toggle` works on
/// write-only pins.
pub struct LedDevice<P, T, const TIMER_HZ: u32>
where
    P: OutputPin,
    T: FugitTimer<TIMER_HZ>,
{
    pin: P,
    timer: T,
    is_on: bool,
    state: Option<LedState<TIMER_HZ>>,
}

impl<P, T, const TIMER_HZ: u32> LedDevice<P, T, TIMER_HZ>
where
    P: OutputPin,
    T: FugitTimer<TIMER_HZ>,
{
    pub fn new(pin: P, timer: T) -> Self {
        Self {
            pin,
            timer,
            is_on: false,
            state: None,
        }
    }
}

impl<P, T, const TIMER_HZ: u32> Actuator for LedDevice<P, T, TIMER_HZ>
where
    P: OutputPin,
    P::Error: Debug,
    T: FugitTimer<TIMER_HZ>,
    T::Error: Debug,
{
    type Action = LedAction<TIMER_HZ>;
    type Error = LedError<P::Error, T::Error>;

    fn run(&mut self, action: &Self::Action) {
        self.state = Some(match action {
            LedAction::Set { is_on } => LedState::Set { is_on: *is_on },
            LedAction::Toggle => LedState::Set { is_on: !self.is_on },
            LedAction::Blink { duration } => LedState::Blink {
                status: LedBlinkStatus::Start,
                duration: *duration,
            },
        });
    }

    fn poll(&mut self) -> Poll<Result<(), Self::Error>> {
        match self.state {
            None => Poll::Ready(Ok(())),
            Some(LedState::Set { is_on }) => {
                self.pin
                    .set_state(PinState::from(is_on))
                    .map_err(LedError::PinSet)?;
                self.is_on = is_on;
                self.state = None;

                Poll::Ready(Ok(()))
            }
            Some(LedState::Blink { status, duration }) => match status {
                LedBlinkStatus::Start => {
                    self.timer.start(duration).map_err(LedError::TimerStart)?;
                    self.pin.set_high().map_err(LedError::PinSet)?;
                    self.is_on = true;

                    self.state = Some(LedState::Blink {
                        status: LedBlinkStatus::Wait,
                        duration,
                    });

                    Poll::Pending
                }
                LedBlinkStatus::Wait => match self.timer.wait() {
                    Ok(()) => {
                        self.pin.set_low().map_err(LedError::PinSet)?;
                        self.is_on = false;
                        self.state = None;

                        Poll::Ready(Ok(()))
                    }
                    Err(nb::Error::WouldBlock) => Poll::Pending,
                    Err(nb::Error::Other(err)) => Poll::Ready(Err(LedError::TimerWait(err))),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use fugit::{ExtU32, TimerInstantU32 as TimerInstant};

    const TEST_HZ: u32 = 1_000;

    #[derive(Default)]
    struct TestPin {
        is_high: bool,
    }

    impl OutputPin for TestPin {
        type Error = Infallible;

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.is_high = true;
            Ok(())
        }

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.is_high = false;
            Ok(())
        }
    }

    #[derive(Default)]
    struct ManualTimer {
        started: Option<TimerDuration<TEST_HZ>>,
        fired: bool,
    }

    impl FugitTimer<TEST_HZ> for ManualTimer {
        type Error = Infallible;

        fn now(&mut self) -> TimerInstant<TEST_HZ> {
            TimerInstant::from_ticks(0)
        }

        fn start(&mut self, duration: TimerDuration<TEST_HZ>) -> Result<(), Infallible> {
            self.started = Some(duration);
            self.fired = false;
            Ok(())
        }

        fn cancel(&mut self) -> Result<(), Infallible> {
            self.started = None;
            Ok(())
        }

        fn wait(&mut self) -> nb::Result<(), Infallible> {
            match self.fired {
                true => Ok(()),
                false => Err(nb::Error::WouldBlock),
            }
        }
    }

    fn led() -> LedDevice<TestPin, ManualTimer, TEST_HZ> {
        LedDevice::new(TestPin::default(), ManualTimer::default())
    }

    #[test]
    fn set_and_toggle_track_the_driven_level() {
        let mut led = led();

        led.run(&LedAction::Set { is_on: true });
        assert!(matches!(led.poll(), Poll::Ready(Ok(()))));
        assert!(led.pin.is_high);

        led.run(&LedAction::Toggle);
        assert!(matches!(led.poll(), Poll::Ready(Ok(()))));
        assert!(!led.pin.is_high);

        led.run(&LedAction::Toggle);
        assert!(matches!(led.poll(), Poll::Ready(Ok(()))));
        assert!(led.pin.is_high);
    }

    #[test]
    fn blink_holds_until_the_timer_fires() {
        let mut led = led();

        led.run(&LedAction::Blink {
            duration: 50.millis(),
        });

        assert!(matches!(led.poll(), Poll::Pending));
        assert!(led.pin.is_high);
        assert_eq!(led.timer.started, Some(50.millis()));

        assert!(matches!(led.poll(), Poll::Pending));

        led.timer.fired = true;
        assert!(matches!(led.poll(), Poll::Ready(Ok(()))));
        assert!(!led.pin.is_high);
    }
}
