use core::fmt::Debug;
use core::task::Poll;
use defmt::Format;
use heapless::Deque;

use crate::actuators::effector::EffectorAction;
use crate::actuators::gate::GateAction;
use crate::actuators::Actuator;
use crate::error::Error;
use crate::kinematics::Pose;
use crate::sensors::colour::{Colour, ColourAction, ColourReader};

/// Where the effector works: the pickup station, the per-colour bins, and
/// the parked travel pose. All poses must be reachable; the plan is fixed
/// at build time and validated by the first move that uses it.
#[derive(Clone, Copy, Debug, Format)]
pub struct SortPlan {
    /// Chip waiting position at the isolator outlet.
    pub pickup: Pose,
    /// Parked pose between cycles and when stopped.
    pub travel: Pose,
    /// Height (mm) added above a station for the approach pose.
    pub clearance: f32,
    /// Drop-off pose per colour, indexed by [`Colour::index`].
    pub bins: [Pose; Colour::COUNT],
}

impl SortPlan {
    fn hover(&self, pose: Pose) -> Pose {
        Pose::new(pose.x, pose.y, pose.z + self.clearance)
    }

    fn bin(&self, colour: Colour) -> Pose {
        self.bins[colour.index()]
    }
}

#[derive(Clone, Copy, Debug, Format, PartialEq, Eq)]
pub enum SorterState {
    Idle,
    Start,
    StartLoop,
    Isolate,
    IsolateLoop,
    Analyse,
    AnalyseLoop,
    Pickup { colour: Colour },
    PickupLoop { colour: Colour },
    Deliver { colour: Colour },
    DeliverLoop { colour: Colour },
    Stop,
    StopLoop,
}

#[derive(Clone, Copy, Debug)]
pub enum SorterError<EffectorError, GateError, ColourError>
where
    EffectorError: Debug,
    GateError: Debug,
    ColourError: Debug,
{
    Effector(EffectorError),
    Gate(GateError),
    Colour(ColourError),
}

impl<EffectorError, GateError, ColourError> Error
    for SorterError<EffectorError, GateError, ColourError>
where
    EffectorError: Debug,
    GateError: Debug,
    ColourError: Debug,
{
}

/// The sorter's operating cycle: isolate a chip, analyse its colour, pick
/// it up, deliver it to the matching bin, repeat.
///
/// `stop` is honoured between device actions: a move already underway
/// finishes first (moves are not cancellable), then the machine parks with
/// the pump off and goes idle.
pub struct SorterMachine<Effector, Gate, ColourLink>
where
    Effector: Actuator<Action = EffectorAction>,
    Gate: Actuator<Action = GateAction>,
    ColourLink: Actuator<Action = ColourAction> + ColourReader,
{
    effector: Effector,
    gate: Gate,
    colour: ColourLink,
    plan: SortPlan,
    state: SorterState,
    effector_queue: Deque<EffectorAction, 8>,
    gate_queue: Deque<GateAction, 2>,
    effector_busy: bool,
    gate_busy: bool,
    chip_counts: [u32; Colour::COUNT],
}

impl<Effector, Gate, ColourLink> SorterMachine<Effector, Gate, ColourLink>
where
    Effector: Actuator<Action = EffectorAction>,
    Gate: Actuator<Action = GateAction>,
    ColourLink: Actuator<Action = ColourAction> + ColourReader,
{
    pub fn new(effector: Effector, gate: Gate, colour: ColourLink, plan: SortPlan) -> Self {
        Self {
            effector,
            gate,
            colour,
            plan,
            state: SorterState::Idle,
            effector_queue: Deque::new(),
            gate_queue: Deque::new(),
            effector_busy: false,
            gate_busy: false,
            chip_counts: [0; Colour::COUNT],
        }
    }

    pub fn state(&self) -> SorterState {
        self.state
    }

    pub fn chip_count(&self, colour: Colour) -> u32 {
        self.chip_counts[colour.index()]
    }

    pub fn chip_counts(&self) -> &[u32; Colour::COUNT] {
        &self.chip_counts
    }

    pub fn reset_counts(&mut self) {
        self.chip_counts = [0; Colour::COUNT];
    }

    pub fn start(&mut self) {
        self.state = SorterState::Start;
    }

    pub fn stop(&mut self) {
        self.state = SorterState::Stop;
    }

    pub fn toggle(&mut self) {
        self.state = match self.state {
            SorterState::Idle | SorterState::Stop | SorterState::StopLoop => SorterState::Start,
            _ => SorterState::Stop,
        };
    }

    /// Queues the parking sequence: gate closed, pump off, park at travel.
    fn queue_parking(&mut self) {
        self.gate_queue.clear();
        self.effector_queue.clear();

        self.gate_queue.push_back(GateAction::Retract).unwrap();
        self.effector_queue
            .push_back(EffectorAction::SetPump { is_on: false })
            .unwrap();
        self.effector_queue
            .push_back(EffectorAction::MoveTo {
                pose: self.plan.travel,
            })
            .unwrap();
    }

    /// Runs the queued effector actions one at a time; `Ready` once the
    /// queue is drained and the device is idle.
    fn poll_effector_queue(&mut self) -> Poll<Result<(), Effector::Error>> {
        if !self.effector_busy {
            match self.effector_queue.pop_front() {
                Some(action) => {
                    self.effector.run(&action);
                    self.effector_busy = true;
                }
                None => return Poll::Ready(Ok(())),
            }
        }

        match self.effector.poll() {
            Poll::Ready(Ok(())) => {
                self.effector_busy = false;

                Poll::Pending
            }
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_gate_queue(&mut self) -> Poll<Result<(), Gate::Error>> {
        if !self.gate_busy {
            match self.gate_queue.pop_front() {
                Some(action) => {
                    self.gate.run(&action);
                    self.gate_busy = true;
                }
                None => return Poll::Ready(Ok(())),
            }
        }

        match self.gate.poll() {
            Poll::Ready(Ok(())) => {
                self.gate_busy = false;

                Poll::Pending
            }
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => Poll::Pending,
        }
    }

    pub fn poll(
        &mut self,
    ) -> Poll<Result<(), SorterError<Effector::Error, Gate::Error, ColourLink::Error>>> {
        match self.state {
            SorterState::Idle => Poll::Ready(Ok(())),
            SorterState::Start => {
                self.queue_parking();
                self.state = SorterState::StartLoop;

                Poll::Pending
            }
            SorterState::StartLoop => {
                let gate_done = match self.poll_gate_queue() {
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(SorterError::Gate(err))),
                    Poll::Ready(Ok(())) => true,
                    Poll::Pending => false,
                };
                let effector_done = match self.poll_effector_queue() {
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(SorterError::Effector(err))),
                    Poll::Ready(Ok(())) => true,
                    Poll::Pending => false,
                };

                if gate_done && effector_done {
                    self.state = SorterState::Isolate;
                }

                Poll::Pending
            }
            SorterState::Isolate => {
                self.gate_queue.clear();
                self.gate_queue.push_back(GateAction::Extend).unwrap();
                self.gate_queue.push_back(GateAction::Retract).unwrap();
                self.state = SorterState::IsolateLoop;

                Poll::Pending
            }
            SorterState::IsolateLoop => {
                match self.poll_gate_queue() {
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(SorterError::Gate(err))),
                    Poll::Ready(Ok(())) => self.state = SorterState::Analyse,
                    Poll::Pending => {}
                }

                Poll::Pending
            }
            SorterState::Analyse => {
                self.colour.run(&ColourAction::Analyse);
                self.state = SorterState::AnalyseLoop;

                Poll::Pending
            }
            SorterState::AnalyseLoop => {
                match self.colour.poll() {
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(SorterError::Colour(err))),
                    Poll::Ready(Ok(())) => match self.colour.take_colour() {
                        Some(colour) => {
                            self.chip_counts[colour.index()] += 1;
                            self.state = SorterState::Pickup { colour };
                        }
                        // nothing usable arrived: ask again
                        None => self.state = SorterState::Analyse,
                    },
                    Poll::Pending => {}
                }

                Poll::Pending
            }
            SorterState::Pickup { colour } => {
                let approach = self.plan.hover(self.plan.pickup);

                self.effector_queue.clear();
                self.effector_queue
                    .push_back(EffectorAction::MoveTo { pose: approach })
                    .unwrap();
                self.effector_queue
                    .push_back(EffectorAction::MoveTo {
                        pose: self.plan.pickup,
                    })
                    .unwrap();
                self.effector_queue
                    .push_back(EffectorAction::SetPump { is_on: true })
                    .unwrap();
                self.effector_queue
                    .push_back(EffectorAction::MoveTo { pose: approach })
                    .unwrap();

                self.state = SorterState::PickupLoop { colour };

                Poll::Pending
            }
            SorterState::PickupLoop { colour } => {
                match self.poll_effector_queue() {
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(SorterError::Effector(err))),
                    Poll::Ready(Ok(())) => self.state = SorterState::Deliver { colour },
                    Poll::Pending => {}
                }

                Poll::Pending
            }
            SorterState::Deliver { colour } => {
                let bin = self.plan.bin(colour);
                let approach = self.plan.hover(bin);

                self.effector_queue.clear();
                self.effector_queue
                    .push_back(EffectorAction::MoveTo { pose: approach })
                    .unwrap();
                self.effector_queue
                    .push_back(EffectorAction::MoveTo { pose: bin })
                    .unwrap();
                self.effector_queue
                    .push_back(EffectorAction::SetPump { is_on: false })
                    .unwrap();
                self.effector_queue
                    .push_back(EffectorAction::MoveTo { pose: approach })
                    .unwrap();
                self.effector_queue
                    .push_back(EffectorAction::MoveTo {
                        pose: self.plan.travel,
                    })
                    .unwrap();

                self.state = SorterState::DeliverLoop { colour };

                Poll::Pending
            }
            SorterState::DeliverLoop { .. } => {
                match self.poll_effector_queue() {
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(SorterError::Effector(err))),
                    Poll::Ready(Ok(())) => self.state = SorterState::Isolate,
                    Poll::Pending => {}
                }

                Poll::Pending
            }
            SorterState::Stop => {
                self.queue_parking();
                self.state = SorterState::StopLoop;

                Poll::Pending
            }
            SorterState::StopLoop => {
                let gate_done = match self.poll_gate_queue() {
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(SorterError::Gate(err))),
                    Poll::Ready(Ok(())) => true,
                    Poll::Pending => false,
                };
                let effector_done = match self.poll_effector_queue() {
                    Poll::Ready(Err(err)) => return Poll::Ready(Err(SorterError::Effector(err))),
                    Poll::Ready(Ok(())) => true,
                    Poll::Pending => false,
                };

                if gate_done && effector_done {
                    self.state = SorterState::Idle;
                }

                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug)]
    struct StubError;

    impl Error for StubError {}

    #[derive(Default)]
    struct StubEffector {
        log: Vec<EffectorAction>,
        fail: bool,
    }

    impl Actuator for StubEffector {
        type Action = EffectorAction;
        type Error = StubError;

        fn run(&mut self, action: &EffectorAction) {
            self.log.push(*action);
        }

        fn poll(&mut self) -> Poll<Result<(), StubError>> {
            match self.fail {
                true => Poll::Ready(Err(StubError)),
                false => Poll::Ready(Ok(())),
            }
        }
    }

    #[derive(Default)]
    struct StubGate {
        log: Vec<GateAction>,
    }

    impl Actuator for StubGate {
        type Action = GateAction;
        type Error = StubError;

        fn run(&mut self, action: &GateAction) {
            self.log.push(*action);
        }

        fn poll(&mut self) -> Poll<Result<(), StubError>> {
            Poll::Ready(Ok(()))
        }
    }

    #[derive(Default)]
    struct StubColour {
        script: VecDeque<Colour>,
        pending: Option<Colour>,
        requests: usize,
    }

    impl Actuator for StubColour {
        type Action = ColourAction;
        type Error = StubError;

        fn run(&mut self, _action: &ColourAction) {
            self.requests += 1;
            self.pending = self.script.pop_front();
        }

        fn poll(&mut self) -> Poll<Result<(), StubError>> {
            Poll::Ready(Ok(()))
        }
    }

    impl ColourReader for StubColour {
        fn take_colour(&mut self) -> Option<Colour> {
            self.pending.take()
        }
    }

    type TestMachine = SorterMachine<StubEffector, StubGate, StubColour>;

    fn plan() -> SortPlan {
        SortPlan {
            pickup: Pose::new(0.0, 120.0, -260.0),
            travel: Pose::new(0.0, 0.0, -220.0),
            clearance: 30.0,
            bins: [
                Pose::new(-90.0, 60.0, -255.0),
                Pose::new(-90.0, 0.0, -255.0),
                Pose::new(-90.0, -60.0, -255.0),
                Pose::new(90.0, 60.0, -255.0),
                Pose::new(90.0, 0.0, -255.0),
                Pose::new(90.0, -60.0, -255.0),
            ],
        }
    }

    fn machine(script: &[Colour]) -> TestMachine {
        let colour = StubColour {
            script: script.iter().copied().collect(),
            ..Default::default()
        };

        SorterMachine::new(StubEffector::default(), StubGate::default(), colour, plan())
    }

    fn poll_until(machine: &mut TestMachine, pred: impl Fn(&TestMachine) -> bool) {
        for _ in 0..300 {
            if pred(machine) {
                return;
            }
            let _ = machine.poll();
        }
        panic!("machine never reached the expected condition");
    }

    #[test]
    fn one_chip_runs_the_full_cycle_into_its_bin() {
        let mut machine = machine(&[Colour::Red]);
        let plan = plan();

        machine.start();
        poll_until(&mut machine, |m| m.chip_count(Colour::Red) == 1);
        poll_until(&mut machine, |m| m.state() == SorterState::Isolate);

        let pickup_hover = Pose::new(0.0, 120.0, -230.0);
        let red_bin = plan.bins[Colour::Red.index()];
        let bin_hover = Pose::new(red_bin.x, red_bin.y, red_bin.z + 30.0);

        assert_eq!(
            machine.effector.log,
            vec![
                // start: park safe
                EffectorAction::SetPump { is_on: false },
                EffectorAction::MoveTo { pose: plan.travel },
                // pickup
                EffectorAction::MoveTo { pose: pickup_hover },
                EffectorAction::MoveTo { pose: plan.pickup },
                EffectorAction::SetPump { is_on: true },
                EffectorAction::MoveTo { pose: pickup_hover },
                // deliver
                EffectorAction::MoveTo { pose: bin_hover },
                EffectorAction::MoveTo { pose: red_bin },
                EffectorAction::SetPump { is_on: false },
                EffectorAction::MoveTo { pose: bin_hover },
                EffectorAction::MoveTo { pose: plan.travel },
            ]
        );

        assert_eq!(
            machine.gate.log,
            vec![GateAction::Retract, GateAction::Extend, GateAction::Retract]
        );
        assert_eq!(machine.colour.requests, 1);

        let mut expected_counts = [0; Colour::COUNT];
        expected_counts[Colour::Red.index()] = 1;
        assert_eq!(machine.chip_counts(), &expected_counts);
    }

    #[test]
    fn stop_parks_pump_off_and_goes_idle() {
        let mut machine = machine(&[]);

        machine.start();
        // no colour ever arrives, so the machine sits in the analyse loop
        poll_until(&mut machine, |m| m.state() == SorterState::AnalyseLoop);

        machine.stop();
        poll_until(&mut machine, |m| m.state() == SorterState::Idle);

        let log = &machine.effector.log;
        assert_eq!(
            &log[log.len() - 2..],
            &[
                EffectorAction::SetPump { is_on: false },
                EffectorAction::MoveTo {
                    pose: plan().travel
                },
            ]
        );
        assert_eq!(machine.gate.log.last(), Some(&GateAction::Retract));

        // idle machines stay idle
        assert!(matches!(machine.poll(), Poll::Ready(Ok(()))));
    }

    #[test]
    fn toggle_flips_between_running_and_stopping() {
        let mut machine = machine(&[]);

        machine.toggle();
        assert_eq!(machine.state(), SorterState::Start);

        poll_until(&mut machine, |m| m.state() == SorterState::AnalyseLoop);
        machine.toggle();
        assert_eq!(machine.state(), SorterState::Stop);

        poll_until(&mut machine, |m| m.state() == SorterState::Idle);
        machine.toggle();
        assert_eq!(machine.state(), SorterState::Start);
    }

    #[test]
    fn device_errors_surface_from_poll() {
        let mut machine = machine(&[]);

        machine.start();
        machine.effector.fail = true;

        let mut saw_error = false;
        for _ in 0..10 {
            if let Poll::Ready(Err(SorterError::Effector(_))) = machine.poll() {
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);
    }

    #[test]
    fn counts_accumulate_and_reset() {
        let mut machine = machine(&[Colour::Green, Colour::Green, Colour::Black]);

        machine.start();
        poll_until(&mut machine, |m| {
            m.chip_count(Colour::Green) == 2 && m.chip_count(Colour::Black) == 1
        });

        machine.reset_counts();
        assert_eq!(machine.chip_counts(), &[0; Colour::COUNT]);
    }
}
