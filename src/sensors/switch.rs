use core::fmt::Debug;
use core::marker::PhantomData;
use defmt::Format;
use embedded_hal::digital::v2::InputPin;
use fugit::TimerDurationU32 as TimerDuration;
use fugit_timer::Timer as FugitTimer;

use super::Sensor;
use crate::error::Error;

/// How long a level must hold before an edge is believed.
const DEBOUNCE_MS: u32 = 150;

#[derive(Clone, Copy, Debug, Format, PartialEq, Eq)]
pub enum SwitchStatus {
    On,
    Off,
}

#[derive(Clone, Copy, Debug, Format, PartialEq, Eq)]
pub struct SwitchUpdate {
    pub status: SwitchStatus,
}

/// Maps a raw pin level to a logical switch status.
pub trait SwitchActiveLevel {
    fn status(is_high: bool) -> SwitchStatus;
}

pub struct SwitchActiveHigh;

impl SwitchActiveLevel for SwitchActiveHigh {
    fn status(is_high: bool) -> SwitchStatus {
        match is_high {
            true => SwitchStatus::On,
            false => SwitchStatus::Off,
        }
    }
}

pub struct SwitchActiveLow;

impl SwitchActiveLevel for SwitchActiveLow {
    fn status(is_high: bool) -> SwitchStatus {
        match is_high {
            true => SwitchStatus::Off,
            false => SwitchStatus::On,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum SwitchError<PinError: Debug, TimerError: Debug> {
    Pin(PinError),
    Timer(TimerError),
}

impl<PinError: Debug, TimerError: Debug> Error for SwitchError<PinError, TimerError> {}

/// A debounced switch or push button.
///
/// Edges are reported once the new level has held steady for the debounce
/// interval; contact chatter inside that window is swallowed.
pub struct SwitchDevice<P, ActiveLevel, T, const TIMER_HZ: u32>
where
    P: InputPin,
    ActiveLevel: SwitchActiveLevel,
    T: FugitTimer<TIMER_HZ>,
{
    pin: P,
    timer: T,
    debounce: TimerDuration<TIMER_HZ>,
    current_status: Option<SwitchStatus>,
    pending_status: Option<SwitchStatus>,
    active_level: PhantomData<ActiveLevel>,
}

impl<P, ActiveLevel, T, const TIMER_HZ: u32> SwitchDevice<P, ActiveLevel, T, TIMER_HZ>
where
    P: InputPin,
    ActiveLevel: SwitchActiveLevel,
    T: FugitTimer<TIMER_HZ>,
{
    pub fn new(pin: P, timer: T) -> Self {
        Self {
            pin,
            timer,
            debounce: TimerDuration::<TIMER_HZ>::millis(DEBOUNCE_MS),
            current_status: None,
            pending_status: None,
            active_level: PhantomData,
        }
    }
}

impl<P, T, const TIMER_HZ: u32> SwitchDevice<P, SwitchActiveHigh, T, TIMER_HZ>
where
    P: InputPin,
    T: FugitTimer<TIMER_HZ>,
{
    pub fn new_active_high(pin: P, timer: T) -> Self {
        Self::new(pin, timer)
    }
}

impl<P, T, const TIMER_HZ: u32> SwitchDevice<P, SwitchActiveLow, T, TIMER_HZ>
where
    P: InputPin,
    T: FugitTimer<TIMER_HZ>,
{
    pub fn new_active_low(pin: P, timer: T) -> Self {
        Self::new(pin, timer)
    }
}

impl<P, ActiveLevel, T, const TIMER_HZ: u32> Sensor for SwitchDevice<P, ActiveLevel, T, TIMER_HZ>
where
    P: InputPin,
    P::Error: Debug,
    ActiveLevel: SwitchActiveLevel,
    T: FugitTimer<TIMER_HZ>,
    T::Error: Debug,
{
    type Message = SwitchUpdate;
    type Error = SwitchError<P::Error, T::Error>;

    fn sense(&mut self) -> Result<Option<SwitchUpdate>, Self::Error> {
        let is_high = self.pin.is_high().map_err(SwitchError::Pin)?;
        let status = ActiveLevel::status(is_high);

        if Some(status) == self.current_status {
            // level bounced back inside the debounce window
            self.pending_status = None;

            return Ok(None);
        }

        if Some(status) != self.pending_status {
            // new candidate level: start holding it off
            self.pending_status = Some(status);
            self.timer.start(self.debounce).map_err(SwitchError::Timer)?;

            return Ok(None);
        }

        match self.timer.wait() {
            Ok(()) => {
                self.current_status = Some(status);
                self.pending_status = None;

                Ok(Some(SwitchUpdate { status }))
            }
            Err(nb::Error::WouldBlock) => Ok(None),
            Err(nb::Error::Other(err)) => Err(SwitchError::Timer(err)),
        }
    }
}
