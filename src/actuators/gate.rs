use core::fmt::Debug;
use core::task::Poll;
use defmt::Format;
use embedded_hal::PwmPin;
use fugit::TimerDurationU32 as TimerDuration;
use fugit_timer::Timer as FugitTimer;
use num::clamp;

use super::Actuator;
use crate::error::Error;

/// Duty is configured per 10 000 counts of the servo PWM period and scaled
/// to whatever resolution the actual PWM channel runs at.
const DUTY_SCALE: u32 = 10_000;

/// Servo tuning for the chip-isolation gate.
#[derive(Clone, Copy, Debug, Format)]
pub struct GateConfig<const TIMER_HZ: u32> {
    /// Duty (per 10 000) with the slide pulled fully back.
    pub retracted_duty: u16,
    /// Duty (per 10 000) with the slide pushed fully out.
    pub extended_duty: u16,
    /// Settling time allowed for the horn to finish travelling.
    pub travel_dwell: TimerDuration<TIMER_HZ>,
}

#[derive(Clone, Copy, Debug, Format, PartialEq, Eq)]
pub enum GateAction {
    Extend,
    Retract,
    /// Partial travel: 0 = retracted, 10 000 = extended.
    SetPosition { per_myriad: u16 },
}

#[derive(Clone, Copy, Debug, Format)]
enum GateStatus {
    Start,
    Dwell,
}

#[derive(Clone, Copy, Debug, Format)]
struct GateState {
    duty_per_myriad: u16,
    status: GateStatus,
}

#[derive(Clone, Copy, Debug)]
pub enum GateError<TimerError: Debug> {
    TimerStart(TimerError),
    TimerWait(TimerError),
}

impl<TimerError: Debug> Error for GateError<TimerError> {}

/// The chip-isolation gate: a hobby servo sliding one chip at a time out of
/// the stack.
///
/// Position commands complete after a fixed travel dwell; the servo gives
/// no feedback.
pub struct GateDevice<Pwm, Timer, const TIMER_HZ: u32>
where
    Pwm: PwmPin<Duty = u16>,
    Timer: FugitTimer<TIMER_HZ>,
{
    pwm: Pwm,
    timer: Timer,
    config: GateConfig<TIMER_HZ>,
    state: Option<GateState>,
}

impl<Pwm, Timer, const TIMER_HZ: u32> GateDevice<Pwm, Timer, TIMER_HZ>
where
    Pwm: PwmPin<Duty = u16>,
    Timer: FugitTimer<TIMER_HZ>,
{
    pub fn new(pwm: Pwm, timer: Timer, config: GateConfig<TIMER_HZ>) -> Self {
        Self {
            pwm,
            timer,
            config,
            state: None,
        }
    }

    /// Interpolates a travel fraction into a duty per 10 000.
    fn duty_for_position(&self, per_myriad: u16) -> u16 {
        let position = clamp(per_myriad, 0, DUTY_SCALE as u16) as i32;
        let retracted = self.config.retracted_duty as i32;
        let extended = self.config.extended_duty as i32;

        (retracted + (extended - retracted) * position / DUTY_SCALE as i32) as u16
    }

    /// Scales a duty per 10 000 to the PWM channel's own resolution.
    fn scale_duty(&mut self, duty_per_myriad: u16) -> u16 {
        let max_duty = self.pwm.get_max_duty() as u32;

        (max_duty * duty_per_myriad as u32 / DUTY_SCALE) as u16
    }
}

impl<Pwm, Timer, const TIMER_HZ: u32> Actuator for GateDevice<Pwm, Timer, TIMER_HZ>
where
    Pwm: PwmPin<Duty = u16>,
    Timer: FugitTimer<TIMER_HZ>,
    Timer::Error: Debug,
{
    type Action = GateAction;
    type Error = GateError<Timer::Error>;

    fn run(&mut self, action: &Self::Action) {
        let duty_per_myriad = match action {
            GateAction::Extend => self.config.extended_duty,
            GateAction::Retract => self.config.retracted_duty,
            GateAction::SetPosition { per_myriad } => self.duty_for_position(*per_myriad),
        };

        self.state = Some(GateState {
            duty_per_myriad,
            status: GateStatus::Start,
        });
    }

    fn poll(&mut self) -> Poll<Result<(), Self::Error>> {
        let GateState {
            duty_per_myriad,
            status,
        } = match self.state {
            Some(state) => state,
            None => return Poll::Ready(Ok(())),
        };

        match status {
            GateStatus::Start => {
                let duty = self.scale_duty(duty_per_myriad);
                self.pwm.set_duty(duty);
                self.pwm.enable();

                self.timer
                    .start(self.config.travel_dwell)
                    .map_err(GateError::TimerStart)?;

                self.state = Some(GateState {
                    duty_per_myriad,
                    status: GateStatus::Dwell,
                });

                Poll::Pending
            }
            GateStatus::Dwell => match self.timer.wait() {
                Ok(()) => {
                    self.state = None;

                    Poll::Ready(Ok(()))
                }
                Err(nb::Error::WouldBlock) => Poll::Pending,
                Err(nb::Error::Other(err)) => Poll::Ready(Err(GateError::TimerWait(err))),
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
    struct MockPwm {
        duty: u16,
        enabled: bool,
    }

    impl PwmPin for MockPwm {
        type Duty = u16;

        fn disable(&mut self) {
            self.enabled = false;
        }

        fn enable(&mut self) {
            self.enabled = true;
        }

        fn get_duty(&self) -> u16 {
            self.duty
        }

        fn get_max_duty(&self) -> u16 {
            20_000
        }

        fn set_duty(&mut self, duty: u16) {
            self.duty = duty;
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

    fn gate() -> GateDevice<MockPwm, ManualTimer, TEST_HZ> {
        GateDevice::new(
            MockPwm::default(),
            ManualTimer::default(),
            GateConfig {
                retracted_duty: 350,
                extended_duty: 1250,
                travel_dwell: 500.millis(),
            },
        )
    }

    #[test]
    fn extend_scales_duty_and_waits_out_the_dwell() {
        let mut gate = gate();

        gate.run(&GateAction::Extend);
        assert!(matches!(gate.poll(), Poll::Pending));

        // 1250 per 10 000 of a 20 000-count period
        assert_eq!(gate.pwm.duty, 2_500);
        assert!(gate.pwm.enabled);
        assert_eq!(gate.timer.started, Some(500.millis()));

        // dwell not elapsed yet
        assert!(matches!(gate.poll(), Poll::Pending));

        gate.timer.fired = true;
        assert!(matches!(gate.poll(), Poll::Ready(Ok(()))));

        // idle afterwards
        assert!(matches!(gate.poll(), Poll::Ready(Ok(()))));
    }

    #[test]
    fn retract_uses_the_lower_bound() {
        let mut gate = gate();

        gate.run(&GateAction::Retract);
        let _ = gate.poll();

        assert_eq!(gate.pwm.duty, 700);
    }

    #[test]
    fn positions_interpolate_and_clamp() {
        let mut gate = gate();

        gate.run(&GateAction::SetPosition { per_myriad: 5_000 });
        let _ = gate.poll();
        // midway between 350 and 1250 is 800 per 10 000
        assert_eq!(gate.pwm.duty, 1_600);

        gate.run(&GateAction::SetPosition { per_myriad: 60_000 });
        let _ = gate.poll();
        // clamped to full extension
        assert_eq!(gate.pwm.duty, 2_500);
    }
}
