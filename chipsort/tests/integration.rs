#![no_std]
#![no_main]

use chipsort as _; // memory layout + panic handler + others

// See https://crates.io/crates/defmt-test/0.3.0 for more documentation (e.g. about the 'state'
// feature)
#[defmt_test::tests]
mod tests {
    use defmt::{assert, assert_eq};
    use sortbot::{angle_to_step, DeltaDimensions, DeltaKinematics, Pose};

    use chipsort::{init_heap, stations};

    #[init]
    fn init() {
        init_heap();
    }

    #[test]
    fn solver_covers_the_sort_plan() {
        let kinematics = DeltaKinematics::new(DeltaDimensions::default());
        let plan = stations::sort_plan();

        assert!(kinematics.solve(&plan.travel).is_ok());
        assert!(kinematics.solve(&plan.pickup).is_ok());
        for bin in plan.bins {
            assert!(kinematics.solve(&bin).is_ok());
        }
    }

    #[test]
    fn step_conversion_matches_the_drive_ratio() {
        assert_eq!(angle_to_step(180.0), 1600);
        assert_eq!(angle_to_step(-90.0), -800);
    }

    #[test]
    fn out_of_envelope_poses_are_rejected() {
        let kinematics = DeltaKinematics::new(DeltaDimensions::default());

        assert!(kinematics.solve(&Pose::new(0.0, 0.0, -1000.0)).is_err());
    }
}
