//! Where everything sits on the assembled frame: the pickup station under
//! the isolator outlet, the six bins, and the servo throws. All measured on
//! the physical machine, millimetres from the base centre.

use fugit::ExtU32;
use sortbot::{Colour, GateConfig, Pose, SortPlan};

pub fn sort_plan() -> SortPlan {
    let mut bins = [Pose::new(0.0, 0.0, 0.0); Colour::COUNT];
    bins[Colour::Red.index()] = Pose::new(-90.0, 60.0, -255.0);
    bins[Colour::Green.index()] = Pose::new(-90.0, 0.0, -255.0);
    bins[Colour::Blue.index()] = Pose::new(-90.0, -60.0, -255.0);
    bins[Colour::White.index()] = Pose::new(90.0, 60.0, -255.0);
    bins[Colour::Black.index()] = Pose::new(90.0, 0.0, -255.0);
    bins[Colour::Other.index()] = Pose::new(90.0, -60.0, -255.0);

    SortPlan {
        pickup: Pose::new(0.0, 120.0, -262.0),
        travel: Pose::new(0.0, 0.0, -220.0),
        clearance: 30.0,
        bins,
    }
}

pub fn gate_config<const TIMER_HZ: u32>() -> GateConfig<TIMER_HZ> {
    GateConfig {
        retracted_duty: 350,
        extended_duty: 1250,
        travel_dwell: 500.millis(),
    }
}
