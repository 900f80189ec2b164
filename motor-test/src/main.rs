//! Bare bring-up program for the motor stack: each button press sweeps all
//! three steppers between home and a fixed step target, no kinematics
//! involved. Wiring matches the sorter firmware.

#![no_main]
#![no_std]

use motor_test as _;

use cortex_m_rt::entry;
use defmt::Debug2Format;
use embedded_hal::blocking::delay::DelayUs;
use stm32f7xx_hal::{pac, prelude::*};

use sortbot::{PinPort, Sensor, SwitchDevice, SwitchStatus, SystemClock};

use motor_test::init_heap;

const TICK_TIMER_HZ: u32 = 1_000_000;

/// Half a motor revolution out and back.
const SWEEP_STEPS: [i32; 3] = [1600, 1600, 1600];
const HOME_STEPS: [i32; 3] = [0, 0, 0];

struct StepDelay(cortex_m::delay::Delay);

impl DelayUs<u32> for StepDelay {
    fn delay_us(&mut self, us: u32) {
        self.0.delay_us(us);
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

    let gpiob = p.GPIOB.split();
    let gpioc = p.GPIOC.split();
    let gpiof = p.GPIOF.split();
    let gpiog = p.GPIOG.split();

    let tick_timer = p.TIM5.counter_us(&clocks);
    let mut clock: SystemClock<_, TICK_TIMER_HZ> = SystemClock::new(tick_timer, u32::MAX);

    let user_button_pin = gpioc.pc13.into_floating_input();
    let mut user_button = SwitchDevice::new_active_high(user_button_pin, clock.channel());

    let mut move_led = gpiob.pb7.into_push_pull_output();

    let motor_port = PinPort::new(
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
    let mut effector = sortbot::EffectorDevice::new(
        motor_port,
        step_delay,
        sortbot::DeltaKinematics::new(sortbot::DeltaDimensions::default()),
    );

    clock.setup().expect("Failed to setup tick clock");

    let mut is_out = false;

    loop {
        clock.tick().expect("Failed to tick clock");

        let update = match user_button.sense() {
            Ok(update) => update,
            Err(err) => {
                defmt::println!("Button error: {}", Debug2Format(&err));
                continue;
            }
        };

        if let Some(SwitchStatus::On) = update.map(|update| update.status) {
            let targets = match is_out {
                true => HOME_STEPS,
                false => SWEEP_STEPS,
            };

            defmt::println!("Sweep to {}", targets);
            move_led.set_high();

            match effector.move_to_steps(targets) {
                Ok(()) => {
                    is_out = !is_out;
                    defmt::println!("At {}", effector.current_steps());
                }
                Err(err) => defmt::println!("Move failed: {}", Debug2Format(&err)),
            }

            move_led.set_low();
        }
    }
}
