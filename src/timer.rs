use alloc::rc::Rc;
use core::sync::atomic::{AtomicU32, Ordering};
use defmt::Format;
use fugit::{TimerDurationU32 as TimerDuration, TimerInstantU32 as TimerInstant};
use fugit_timer::Timer;

/// Fans one hardware counter out to any number of logical timers.
///
/// The main loop calls [`SystemClock::tick`] frequently to refresh the
/// shared tick count; every [`ClockChannel`] handed to a device measures
/// time against that count instead of owning hardware.
pub struct SystemClock<T, const TIMER_HZ: u32>
where
    T: Timer<TIMER_HZ>,
{
    ticks: Rc<AtomicU32>,
    timer: T,
    wrap_ticks: u32,
}

impl<T, const TIMER_HZ: u32> SystemClock<T, TIMER_HZ>
where
    T: Timer<TIMER_HZ>,
{
    pub fn new(timer: T, wrap_ticks: u32) -> Self {
        Self {
            ticks: Rc::new(AtomicU32::new(0)),
            timer,
            wrap_ticks,
        }
    }

    /// Starts the hardware counter on its full wrap interval.
    pub fn setup(&mut self) -> Result<(), T::Error> {
        self.timer
            .start(TimerDuration::<TIMER_HZ>::from_ticks(self.wrap_ticks))
    }

    /// Publishes the counter value to every channel and restarts the
    /// counter when it expires.
    pub fn tick(&mut self) -> Result<(), T::Error> {
        let now = self.timer.now();
        self.ticks.store(now.ticks(), Ordering::SeqCst);

        match self.timer.wait() {
            Ok(()) => self.setup(),
            Err(nb::Error::WouldBlock) => Ok(()),
            Err(nb::Error::Other(err)) => Err(err),
        }
    }

    pub fn now(&self) -> TimerInstant<TIMER_HZ> {
        TimerInstant::from_ticks(self.ticks.load(Ordering::SeqCst))
    }

    /// A new logical timer backed by this clock.
    pub fn channel(&self) -> ClockChannel<TIMER_HZ> {
        ClockChannel::new(self.ticks.clone())
    }
}

#[derive(Clone, Copy, Debug, Format)]
enum ChannelState<const TIMER_HZ: u32> {
    Stopped,
    Armed {
        start: TimerInstant<TIMER_HZ>,
        duration: TimerDuration<TIMER_HZ>,
    },
}

#[derive(Debug)]
pub enum ClockChannelError {
    NotStarted,
}

/// One logical timer on the shared clock.
#[derive(Clone)]
pub struct ClockChannel<const TIMER_HZ: u32> {
    ticks: Rc<AtomicU32>,
    state: ChannelState<TIMER_HZ>,
}

impl<const TIMER_HZ: u32> ClockChannel<TIMER_HZ> {
    fn new(ticks: Rc<AtomicU32>) -> Self {
        Self {
            ticks,
            state: ChannelState::Stopped,
        }
    }

    /// Ticks since the channel was armed, wrap-around safe.
    fn elapsed(&self, start: TimerInstant<TIMER_HZ>) -> u32 {
        let now = self.ticks.load(Ordering::SeqCst);

        now.wrapping_sub(start.ticks())
    }
}

impl<const TIMER_HZ: u32> Timer<TIMER_HZ> for ClockChannel<TIMER_HZ> {
    type Error = ClockChannelError;

    fn now(&mut self) -> TimerInstant<TIMER_HZ> {
        TimerInstant::from_ticks(self.ticks.load(Ordering::SeqCst))
    }

    fn start(&mut self, duration: TimerDuration<TIMER_HZ>) -> Result<(), Self::Error> {
        self.state = ChannelState::Armed {
            start: self.now(),
            duration,
        };

        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        match self.state {
            ChannelState::Stopped => Err(ClockChannelError::NotStarted),
            ChannelState::Armed { .. } => {
                self.state = ChannelState::Stopped;

                Ok(())
            }
        }
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        match self.state {
            ChannelState::Stopped => Err(nb::Error::Other(ClockChannelError::NotStarted)),
            ChannelState::Armed { start, duration } => {
                match self.elapsed(start) >= duration.ticks() {
                    true => Ok(()),
                    false => Err(nb::Error::WouldBlock),
                }
            }
        }
    }
}
