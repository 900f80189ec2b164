#![no_main]
#![no_std]

use chipsort as _;

use core::fmt::Debug;
use core::task::Poll;
use cortex_m_rt::entry;
use defmt::Debug2Format;
use embedded_hal::blocking::delay::DelayUs;
use fugit::ExtU32;
use stm32f7xx_hal::{
    gpio::{self, Alternate, Floating, Input, Output, Pin, PushPull},
    pac,
    prelude::*,
    serial::{Config as SerialConfig, Serial},
    timer::Counter,
    watchdog,
};

use sortbot::{
    Actuator, ClockChannel, ColourDevice, DeltaDimensions, DeltaKinematics, EffectorDevice,
    GateDevice, LedAction, LedDevice, PinPort, Sensor, SorterMachine, SorterState,
    SwitchActiveHigh, SwitchDevice, SwitchStatus, SystemClock,
};

use chipsort::{init_heap, stations};

const TICK_TIMER_MAX: u32 = u32::MAX;
const TICK_TIMER_HZ: u32 = 1_000_000;
type TickTimerDevice = Counter<pac::TIM5, TICK_TIMER_HZ>;
type TickClock = SystemClock<TickTimerDevice, TICK_TIMER_HZ>;

type UserButtonPin = Pin<'C', 13, Input<Floating>>;
type UserButton =
    SwitchDevice<UserButtonPin, SwitchActiveHigh, ClockChannel<TICK_TIMER_HZ>, TICK_TIMER_HZ>;

/* status leds */

type RunningLedPin = Pin<'B', 0, Output<PushPull>>; // green
type CycleLedPin = Pin<'B', 7, Output<PushPull>>; // blue
type StoppedLedPin = Pin<'B', 14, Output<PushPull>>; // red
type StatusLed<P> = LedDevice<P, ClockChannel<TICK_TIMER_HZ>, TICK_TIMER_HZ>;

/* motor output port, one GPIO per line */

type Motor1StepPin = Pin<'G', 1, Output<PushPull>>;
type Motor1DirPin = Pin<'F', 9, Output<PushPull>>;
type Motor2StepPin = Pin<'F', 7, Output<PushPull>>;
type Motor2DirPin = Pin<'F', 8, Output<PushPull>>;
type Motor3StepPin = Pin<'F', 6, Output<PushPull>>;
type Motor3DirPin = Pin<'F', 10, Output<PushPull>>;
type MotorDisablePin = Pin<'G', 2, Output<PushPull>>;
type PumpPin = Pin<'G', 3, Output<PushPull>>;
type MotorPort = PinPort<
    Motor1StepPin,
    Motor1DirPin,
    Motor2StepPin,
    Motor2DirPin,
    Motor3StepPin,
    Motor3DirPin,
    MotorDisablePin,
    PumpPin,
>;

/* chip gate servo */

const GATE_PWM_HZ: u32 = 50;

/* colour analyser link */

type ColourSerial = Serial<pac::USART3, (gpio::PD8<Alternate<7>>, gpio::PD9<Alternate<7>>)>;

/// SysTick behind the blocking-delay trait the effector's pulse dwell wants.
struct StepDelay(cortex_m::delay::Delay);

impl DelayUs<u32> for StepDelay {
    fn delay_us(&mut self, us: u32) {
        self.0.delay_us(us);
    }
}

fn drive_led<Led>(led: &mut Led, is_on: bool)
where
    Led: Actuator<Action = LedAction<TICK_TIMER_HZ>>,
    Led::Error: Debug,
{
    led.run(&LedAction::Set { is_on });
    if let Poll::Ready(Err(err)) = led.poll() {
        defmt::println!("Led error: {}", Debug2Format(&err));
    }
}

#[entry]
fn main() -> ! {
    init_heap();

    defmt::println!("Init!");

    let cp = cortex_m::Peripherals::take().unwrap();
    let p = pac::Peripherals::take().unwrap();

    let rcc = p.RCC.constrain();
    let clocks = rcc.cfgr.sysclk(216.MHz()).freeze();

    let gpioa = p.GPIOA.split();
    let gpiob = p.GPIOB.split();
    let gpioc = p.GPIOC.split();
    let gpiod = p.GPIOD.split();
    let gpiof = p.GPIOF.split();
    let gpiog = p.GPIOG.split();

    let tick_timer_device: TickTimerDevice = p.TIM5.counter_us(&clocks);
    let mut clock: TickClock = SystemClock::new(tick_timer_device, TICK_TIMER_MAX);

    let user_button_pin: UserButtonPin = gpioc.pc13.into_floating_input();
    let mut user_button: UserButton =
        SwitchDevice::new_active_high(user_button_pin, clock.channel());

    let running_led_pin: RunningLedPin = gpiob.pb0.into_push_pull_output();
    let mut running_led: StatusLed<RunningLedPin> =
        LedDevice::new(running_led_pin, clock.channel());

    let cycle_led_pin: CycleLedPin = gpiob.pb7.into_push_pull_output();
    let mut cycle_led: StatusLed<CycleLedPin> = LedDevice::new(cycle_led_pin, clock.channel());

    let stopped_led_pin: StoppedLedPin = gpiob.pb14.into_push_pull_output();
    let mut stopped_led: StatusLed<StoppedLedPin> =
        LedDevice::new(stopped_led_pin, clock.channel());

    let motor_port: MotorPort = PinPort::new(
        gpiog.pg1.into_push_pull_output(),
        gpiof.pf9.into_push_pull_output(),
        gpiof.pf7.into_push_pull_output(),
        gpiof.pf8.into_push_pull_output(),
        gpiof.pf6.into_push_pull_output(),
        gpiof.pf10.into_push_pull_output(),
        gpiog.pg2.into_push_pull_output(),
        gpiog.pg3.into_push_pull_output(),
    )
    .expect("Failed to reset the motor port");

    let step_delay = StepDelay(cortex_m::delay::Delay::new(
        cp.SYST,
        clocks.sysclk().raw(),
    ));
    let effector = EffectorDevice::new(
        motor_port,
        step_delay,
        DeltaKinematics::new(DeltaDimensions::default()),
    );

    let gate_servo_pin = gpioa.pa8.into_alternate();
    let gate_pwm = p
        .TIM1
        .pwm_hz(gate_servo_pin, GATE_PWM_HZ.Hz(), &clocks)
        .split();
    let gate = GateDevice::new(gate_pwm, clock.channel(), stations::gate_config());

    let colour_serial: ColourSerial = Serial::new(
        p.USART3,
        (gpiod.pd8.into_alternate(), gpiod.pd9.into_alternate()),
        &clocks,
        SerialConfig {
            baud_rate: 9600.bps(),
            ..Default::default()
        },
    );
    let colour_link = ColourDevice::new(colour_serial);

    let mut machine = SorterMachine::new(effector, gate, colour_link, stations::sort_plan());

    let mut iwdg = watchdog::IndependentWatchdog::new(p.IWDG);

    // generous: a worst-case coordinated move blocks for a few hundred ms
    iwdg.start(2000.millis());

    clock.setup().expect("Failed to setup tick clock");

    let mut last_state = machine.state();
    let mut last_sorted = 0u32;
    drive_led(&mut stopped_led, true);

    loop {
        clock.tick().expect("Failed to tick clock");

        if let Some(update) = user_button.sense().expect("Error reading user button") {
            if let SwitchStatus::On = update.status {
                machine.toggle();
            }
        }

        if let Poll::Ready(Err(err)) = machine.poll() {
            defmt::println!("Sorter error: {}", Debug2Format(&err));

            machine.stop();
        }

        let state = machine.state();
        if state != last_state {
            defmt::println!("Sorter state: {}", state);

            let is_running = state != SorterState::Idle;
            let in_cycle = !matches!(
                state,
                SorterState::Idle
                    | SorterState::Start
                    | SorterState::StartLoop
                    | SorterState::Stop
                    | SorterState::StopLoop
            );

            drive_led(&mut running_led, is_running);
            drive_led(&mut stopped_led, !is_running);
            drive_led(&mut cycle_led, in_cycle);

            last_state = state;
        }

        let sorted: u32 = machine.chip_counts().iter().sum();
        if sorted != last_sorted {
            defmt::println!("Chips sorted: {}", sorted);

            last_sorted = sorted;
        }

        iwdg.feed();
    }
}
