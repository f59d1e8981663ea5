use crank_core::debounce::{ButtonLevel, DebounceIntegrator, DebounceThresholds};
use crank_core::position::{PositionStateMachine, PositionTable};
use crank_core::scheduler::TickTimeline;
use crank_core::time::Millis;
use proptest::prelude::*;

fn thresholds() -> impl Strategy<Value = DebounceThresholds> {
    (1u16..=20)
        .prop_flat_map(|max| (1..=max, Just(max)))
        .prop_flat_map(|(on, max)| (0..on, Just(on), Just(max)))
        .prop_map(|(off, on, max)| DebounceThresholds::new(on, off, max).expect("valid"))
}

proptest! {
    #[test]
    fn counter_stays_within_bounds(
        thresholds in thresholds(),
        samples in proptest::collection::vec(any::<bool>(), 0..400),
    ) {
        let mut integrator = DebounceIntegrator::new(thresholds);
        let mut previous = integrator.level();
        for sample in samples {
            let step = integrator.step(sample);
            let counter = integrator.counter();
            prop_assert!(counter <= thresholds.max());

            if counter >= thresholds.on() {
                prop_assert_eq!(step.level, ButtonLevel::Down);
            } else if counter <= thresholds.off() {
                prop_assert_eq!(step.level, ButtonLevel::Up);
            } else {
                // Inside the hysteresis band the level holds.
                prop_assert_eq!(step.level, previous);
            }
            previous = step.level;
        }
    }

    #[test]
    fn every_edge_is_an_up_to_down_transition(
        samples in proptest::collection::vec(any::<bool>(), 0..400),
    ) {
        let mut integrator = DebounceIntegrator::default();
        let mut previous = integrator.level();
        for sample in samples {
            let step = integrator.step(sample);
            prop_assert_eq!(
                step.pressed,
                previous == ButtonLevel::Up && step.level == ButtonLevel::Down
            );
            previous = step.level;
        }
    }

    #[test]
    fn sustained_activity_fires_exactly_once(thresholds in thresholds(), extra in 0usize..50) {
        let mut integrator = DebounceIntegrator::new(thresholds);
        let ticks = usize::from(thresholds.max()) + extra;
        let edges = (0..ticks).filter(|_| integrator.step(true).pressed).count();
        prop_assert_eq!(edges, 1);
    }

    #[test]
    fn timeline_remainder_is_below_one_period(
        start in any::<u32>(),
        advance in any::<u32>(),
        period in 1u32..1_000,
        cap in 1u32..128,
    ) {
        let mut timeline = TickTimeline::new(Millis::from_raw(start), period, cap);
        let now = Millis::from_raw(start.wrapping_add(advance));
        let due = timeline.due_ticks(now);

        prop_assert!(timeline.pending(now) < period);
        prop_assert!(due.replay <= cap);
        prop_assert_eq!(due.elapsed(), advance / period);
    }

    #[test]
    fn presses_cycle_modulo_table_length(presses in 0usize..50) {
        let table = PositionTable::CRANK;
        let mut machine = PositionStateMachine::new(table);
        for _ in 0..presses {
            machine.advance();
        }
        prop_assert_eq!(machine.current().get(), presses % table.len());
    }
}
