use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use arc_swap::{ArcSwap, ArcSwapOption, Guard};
use quanta::{Clock, Instant};
use tracing::trace;

use crate::atomics::AtomicF64;

use super::{
    fastrand_unit, Reservoir, DEFAULT_DECAY_ALPHA, DEFAULT_RESCALE_THRESHOLD, DEFAULT_RESERVOIR_SIZE,
};

struct WeightedSample {
    value: i64,
    priority: f64,
}

/// The lowest-priority sample found by a scan of the slots.
struct Lowest {
    idx: usize,
    priority: f64,
    /// Whether every slot held a sample during the scan.
    complete: bool,
}

/// Samples relative to a single landmark.
///
/// Once every slot is filled, a new sample only gets in by replacing the sample with the lowest
/// priority, and only if its own priority is higher.  The lowest priority in the slots therefore
/// never decreases, and `floor` caches a lower bound for it so that most losing candidates are
/// turned away without scanning.
struct State {
    landmark: Instant,
    slots: Box<[ArcSwapOption<WeightedSample>]>,
    filled: AtomicUsize,
    floor: AtomicF64,
}

impl State {
    fn new(landmark: Instant, size: usize) -> State {
        let slots = (0..size).map(|_| ArcSwapOption::empty()).collect::<Vec<_>>();
        State {
            landmark,
            slots: slots.into_boxed_slice(),
            filled: AtomicUsize::new(0),
            floor: AtomicF64::new(0.0),
        }
    }

    fn offer(&self, sample: WeightedSample) {
        let idx = self.filled.fetch_add(1, Ordering::AcqRel);
        if idx < self.slots.len() {
            self.slots[idx].store(Some(Arc::new(sample)));
            return;
        }

        if sample.priority <= self.floor.load(Ordering::Acquire) {
            return;
        }

        let candidate = Arc::new(sample);
        loop {
            let Some(Lowest { idx, priority: lowest, complete }) = self.lowest_priority() else {
                return;
            };
            // A slot still waiting on its fill-phase store may end up below `lowest`.
            if complete {
                self.floor.fetch_update(|floor| floor.max(lowest));
            }
            if candidate.priority <= lowest {
                return;
            }

            let current = self.slots[idx].load_full();
            match &current {
                Some(existing) if existing.priority == lowest => {}
                // Replaced under us: rescan.
                _ => continue,
            }

            let previous = self.slots[idx].compare_and_swap(&current, Some(Arc::clone(&candidate)));
            let swapped = match (&*previous, &current) {
                (Some(previous), Some(current)) => Arc::ptr_eq(previous, current),
                _ => false,
            };
            if swapped {
                return;
            }
        }
    }

    fn lowest_priority(&self) -> Option<Lowest> {
        let mut lowest: Option<Lowest> = None;
        let mut complete = true;
        for (idx, slot) in self.slots.iter().enumerate() {
            let guard = slot.load();
            match guard.as_ref() {
                Some(sample) => {
                    if lowest.as_ref().map_or(true, |lowest| sample.priority < lowest.priority) {
                        lowest = Some(Lowest { idx, priority: sample.priority, complete: true });
                    }
                }
                None => complete = false,
            }
        }
        lowest.map(|lowest| Lowest { complete, ..lowest })
    }

    fn samples(&self) -> impl Iterator<Item = Arc<WeightedSample>> + '_ {
        self.slots.iter().filter_map(|slot| slot.load_full())
    }

    fn len(&self) -> usize {
        self.filled.load(Ordering::Acquire).min(self.slots.len())
    }

    /// Builds a new state anchored at `landmark`, carrying over every retained sample.
    ///
    /// Every priority is scaled by the same factor, so the relative order of the retained samples
    /// is unchanged.  Samples whose priority underflows to zero are dropped.
    fn rescale(&self, landmark: Instant, alpha: f64) -> State {
        let elapsed = landmark.saturating_duration_since(self.landmark).as_secs_f64();
        let factor = (-alpha * elapsed).exp();

        let next = State::new(landmark, self.slots.len());
        let mut filled = 0;
        for sample in self.samples() {
            let priority = sample.priority * factor;
            if priority > 0.0 && filled < next.slots.len() {
                next.slots[filled].store(Some(Arc::new(WeightedSample { value: sample.value, priority })));
                filled += 1;
            }
        }
        next.filled.store(filled, Ordering::Release);
        next
    }
}

/// An exponentially-decaying sampling reservoir.
///
/// Uses Cormode et al.'s [forward-decaying priority sampling][fwd] to keep a sample that is
/// exponentially biased towards recent values.  Each value gets a weight of
/// `exp(alpha * t)`, where `t` is the number of seconds since the current landmark, and a priority
/// of `weight / u` with `u` drawn uniformly from `(0, 1]`.  The reservoir keeps the values with the
/// highest priorities.
///
/// As weights grow exponentially, the landmark is moved forward every `rescale_threshold`, scaling
/// every retained priority down by `exp(-alpha * (new_landmark - old_landmark))`.  The new state is
/// swapped in atomically; a value recorded concurrently into the old state while the swap happens
/// may be lost.
///
/// Updates never take a lock.  Filling the reservoir is a single atomic increment and store; once
/// full, a value whose priority beats the lowest retained priority replaces it through a scan and
/// a compare-and-swap.
///
/// [fwd]: http://dimacs.rutgers.edu/~graham/pubs/papers/fwddecay.pdf
pub struct ExponentiallyDecayingReservoir {
    state: ArcSwap<State>,
    alpha: f64,
    rescale_threshold: Duration,
    clock: Clock,
}

impl ExponentiallyDecayingReservoir {
    /// Creates a new `ExponentiallyDecayingReservoir`.
    ///
    /// `size` is the number of samples to keep (a size of zero is bumped up to one), and `alpha` is
    /// the decay factor: the higher it is, the more the sample is biased towards newer values.
    pub fn new(size: usize, alpha: f64, clock: Clock) -> Self {
        Self::with_rescale_threshold(size, alpha, DEFAULT_RESCALE_THRESHOLD, clock)
    }

    /// Creates a new `ExponentiallyDecayingReservoir` that moves its landmark every
    /// `rescale_threshold`.
    pub fn with_rescale_threshold(size: usize, alpha: f64, rescale_threshold: Duration, clock: Clock) -> Self {
        let landmark = clock.now();
        Self {
            state: ArcSwap::from_pointee(State::new(landmark, size.max(1))),
            alpha,
            rescale_threshold,
            clock,
        }
    }

    /// Records a value as of the given instant.
    pub fn update_at(&self, value: i64, now: Instant) {
        let state = self.rescale_if_needed(now);
        let elapsed = now.saturating_duration_since(state.landmark).as_secs_f64();
        let weight = (self.alpha * elapsed).exp();
        let priority = weight / fastrand_unit();
        state.offer(WeightedSample { value, priority });
    }

    fn rescale_if_needed(&self, now: Instant) -> Guard<Arc<State>> {
        let current = self.state.load();
        if now.saturating_duration_since(current.landmark) < self.rescale_threshold {
            return current;
        }

        let current = Guard::into_inner(current);
        let rescaled = Arc::new(current.rescale(now, self.alpha));
        let previous = self.state.compare_and_swap(&current, Arc::clone(&rescaled));
        if Arc::ptr_eq(&previous, &current) {
            trace!(retained = rescaled.len(), "rescaled exponentially decaying reservoir");
        }

        // Whether we won or lost the race, the freshest state is the one to use.
        self.state.load()
    }
}

impl Default for ExponentiallyDecayingReservoir {
    fn default() -> Self {
        ExponentiallyDecayingReservoir::new(DEFAULT_RESERVOIR_SIZE, DEFAULT_DECAY_ALPHA, Clock::new())
    }
}

impl Reservoir for ExponentiallyDecayingReservoir {
    fn update(&self, value: i64) {
        self.update_at(value, self.clock.now());
    }

    fn size(&self) -> usize {
        self.state.load().len()
    }

    fn values(&self) -> Vec<i64> {
        let state = self.rescale_if_needed(self.clock.now());
        state.samples().map(|sample| sample.value).collect()
    }
}
