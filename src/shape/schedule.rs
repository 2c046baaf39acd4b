use std::time::Duration;

use rand::{rngs::StdRng, Rng};
use serde::Serialize;

/// Shortest cycle a schedule hands out. A zero length would expire every
/// cycle before it admits anything.
pub const MIN_CYCLE_LENGTH: Duration = Duration::from_millis(1);

/// One interval with a fixed concurrency target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Cycle {
    pub concurrency: usize,
    /// How long the cycle may last. `Duration::MAX` means it only ends with
    /// the run.
    pub duration: Duration,
}

impl Cycle {
    pub fn new(concurrency: usize, duration: Duration) -> Self {
        Self {
            concurrency,
            duration,
        }
    }

    /// A cycle bounded only by the run itself.
    pub fn unbounded(concurrency: usize) -> Self {
        Self::new(concurrency, Duration::MAX)
    }
}

/// Produces the cycles of a traffic shape, one at a time.
///
/// Schedules are pure state machines: the only randomness comes from the
/// generator handed in, so a seeded generator reproduces the same sequence.
pub trait Schedule: Send {
    /// The next cycle, or `None` when the shape has nothing left to run.
    fn next_cycle(&mut self, rng: &mut StdRng) -> Option<Cycle>;
}

/// Full concurrency for the whole run.
#[derive(Clone, Debug)]
pub struct Flat {
    concurrency: usize,
    started: bool,
}

impl Flat {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            started: false,
        }
    }
}

impl Schedule for Flat {
    fn next_cycle(&mut self, _: &mut StdRng) -> Option<Cycle> {
        if self.started {
            return None;
        }
        self.started = true;
        Some(Cycle::unbounded(self.concurrency))
    }
}

/// Triangle wave between 1 and `max`, one step per cycle:
/// `1, 2, .., max, max - 1, .., 1, 2, ..`.
#[derive(Clone, Debug)]
pub struct Triangle {
    max: usize,
    current: usize,
    ascending: bool,
    length: Duration,
}

impl Triangle {
    pub fn new(max: usize, length: Duration) -> Self {
        Self {
            max: max.max(1),
            current: 1,
            ascending: true,
            length: length.max(MIN_CYCLE_LENGTH),
        }
    }
}

impl Schedule for Triangle {
    fn next_cycle(&mut self, _: &mut StdRng) -> Option<Cycle> {
        let cycle = Cycle::new(self.current, self.length);
        if self.max == 1 {
            return Some(cycle);
        }

        if self.ascending && self.current == self.max {
            self.ascending = false;
        } else if !self.ascending && self.current == 1 {
            self.ascending = true;
        }
        if self.ascending {
            self.current += 1;
        } else {
            self.current -= 1;
        }
        Some(cycle)
    }
}

/// Alternates idle and spike cycles.
///
/// Starts idle (`k = 1`) for one base length. Spikes run at `max` for exactly
/// the base length; every later idle cycle lasts a random 1 to 4 base lengths.
#[derive(Clone, Debug)]
pub struct Burst {
    max: usize,
    base: Duration,
    first: bool,
    idle_next: bool,
}

impl Burst {
    pub fn new(max: usize, base: Duration) -> Self {
        Self {
            max: max.max(1),
            base: base.max(MIN_CYCLE_LENGTH),
            first: true,
            idle_next: false,
        }
    }
}

impl Schedule for Burst {
    fn next_cycle(&mut self, rng: &mut StdRng) -> Option<Cycle> {
        if self.first {
            self.first = false;
            return Some(Cycle::new(1, self.base));
        }
        let cycle = if self.idle_next {
            let tail: u32 = rng.gen_range(1..=4);
            Cycle::new(1, self.base * tail)
        } else {
            Cycle::new(self.max, self.base)
        };
        self.idle_next = !self.idle_next;
        Some(cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn take(schedule: &mut dyn Schedule, n: usize, seed: u64) -> Vec<Cycle> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map_while(|_| schedule.next_cycle(&mut rng)).collect()
    }

    #[test]
    fn flat_is_one_unbounded_cycle() {
        let cycles = take(&mut Flat::new(5), 3, 0);
        assert_eq!(cycles, vec![Cycle::unbounded(5)]);
    }

    mod triangle {
        use super::*;

        #[test]
        fn oscillates_between_one_and_max() {
            let length = Duration::from_secs(120);
            let ks: Vec<usize> = take(&mut Triangle::new(4, length), 13, 0)
                .iter()
                .map(|c| c.concurrency)
                .collect();

            assert_eq!(ks, vec![1, 2, 3, 4, 3, 2, 1, 2, 3, 4, 3, 2, 1]);
        }

        #[test]
        fn fixed_length() {
            let length = Duration::from_secs(120);
            let cycles = take(&mut Triangle::new(3, length), 10, 0);
            assert!(cycles.iter().all(|c| c.duration == length));
        }

        #[test]
        fn max_of_one_stays_at_one() {
            let cycles = take(&mut Triangle::new(1, Duration::from_secs(1)), 5, 0);
            assert!(cycles.iter().all(|c| c.concurrency == 1));
        }

        #[test]
        fn zero_length_is_clamped() {
            let cycles = take(&mut Triangle::new(3, Duration::ZERO), 5, 0);
            assert!(cycles.iter().all(|c| c.duration == MIN_CYCLE_LENGTH));
        }

        #[test]
        fn max_of_two() {
            let ks: Vec<usize> = take(&mut Triangle::new(2, Duration::from_secs(1)), 5, 0)
                .iter()
                .map(|c| c.concurrency)
                .collect();
            assert_eq!(ks, vec![1, 2, 1, 2, 1]);
        }
    }

    mod burst {
        use super::*;

        #[test]
        fn alternates_idle_and_spike() {
            let base = Duration::from_secs(120);
            for seed in 0..20 {
                let cycles = take(&mut Burst::new(8, base), 40, seed);
                assert_eq!(cycles[0], Cycle::new(1, base));

                for (i, cycle) in cycles.iter().enumerate() {
                    if i % 2 == 1 {
                        assert_eq!(*cycle, Cycle::new(8, base));
                    } else {
                        assert_eq!(cycle.concurrency, 1);
                        let n = cycle.duration.as_nanos() / base.as_nanos();
                        assert_eq!(cycle.duration.as_nanos() % base.as_nanos(), 0);
                        assert!((1..=4).contains(&n), "idle tail of {n} base lengths");
                    }
                }
            }
        }

        #[test]
        fn idle_tails_vary() {
            let base = Duration::from_secs(1);
            let cycles = take(&mut Burst::new(2, base), 200, 7);
            let tails: std::collections::BTreeSet<_> = cycles
                .iter()
                .filter(|c| c.concurrency == 1)
                .map(|c| c.duration.as_secs())
                .collect();

            assert_eq!(tails.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        }

        #[test]
        fn zero_base_is_clamped() {
            let cycles = take(&mut Burst::new(3, Duration::ZERO), 20, 5);
            assert!(cycles.iter().all(|c| c.duration >= MIN_CYCLE_LENGTH));
            assert_eq!(cycles[1].duration, MIN_CYCLE_LENGTH);
        }

        #[test]
        fn same_seed_same_sequence() {
            let base = Duration::from_secs(1);
            assert_eq!(
                take(&mut Burst::new(3, base), 30, 42),
                take(&mut Burst::new(3, base), 30, 42)
            );
        }
    }
}
