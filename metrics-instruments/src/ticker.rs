//! Periodic ticking of moving averages.

use std::{
    io,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::debug;

/// Something that must be ticked at a fixed interval.
///
/// [`Meter`](crate::Meter) and [`Timer`](crate::Timer) fold their recent events into their moving
/// averages on every tick.
pub trait Tick: Send + Sync {
    /// Advances by one interval.
    fn tick(&self);
}

/// Identifies a registration with a [`Ticker`].
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct TickHandle(u64);

#[derive(Default)]
struct Shared {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Weak<dyn Tick>)>>,
}

impl Shared {
    fn tick_all(&self) {
        // Tick outside of the lock so a slow `tick` never holds up registration.
        let live = {
            let mut entries = self.entries.lock();
            entries.retain(|(_, entry)| entry.strong_count() > 0);
            entries.iter().filter_map(|(_, entry)| entry.upgrade()).collect::<Vec<_>>()
        };

        for entry in live {
            entry.tick();
        }
    }
}

/// A background thread ticking every registered [`Tick`] at a fixed interval.
///
/// Only weak references are held, so registered values are never kept alive by the ticker.  The
/// thread stops when the `Ticker` is dropped.
pub(crate) struct Ticker {
    shared: Arc<Shared>,
    interval: Duration,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawns a new ticker thread, ticking every `interval`.
    pub fn spawn(interval: Duration) -> io::Result<Ticker> {
        let shared = Arc::new(Shared::default());
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("metrics-instruments-ticker".to_string())
            .spawn(move || {
                debug!(?interval, "ticker started");

                let mut next = Instant::now() + interval;
                loop {
                    match shutdown_rx.recv_deadline(next) {
                        Err(RecvTimeoutError::Timeout) => {
                            thread_shared.tick_all();
                            next += interval;

                            // Skip the ticks we missed rather than firing them back to back.
                            let now = Instant::now();
                            if next < now {
                                next = now + interval;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                debug!("ticker stopped");
            })?;

        Ok(Ticker { shared, interval, shutdown: Some(shutdown_tx), handle: Some(handle) })
    }

    /// Gets the interval between two ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Registers `entry` to be ticked until it is deregistered or dropped.
    pub fn register(&self, entry: &Arc<dyn Tick>) -> TickHandle {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.entries.lock().push((id, Arc::downgrade(entry)));
        TickHandle(id)
    }

    /// Stops ticking the entry registered under `handle`.
    pub fn deregister(&self, handle: &TickHandle) {
        self.shared.entries.lock().retain(|(id, _)| *id != handle.0);
    }

    /// Ticks every registered entry once, right now.
    pub fn tick_now(&self) {
        self.shared.tick_all();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        // Dropping the sender wakes the thread up immediately.
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    use super::{Tick, Ticker};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Tick for Counting {
        fn tick(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn ticks_registered_entries() {
        let ticker = Ticker::spawn(Duration::from_millis(10)).unwrap();
        let counting = Arc::new(Counting::default());
        let entry: Arc<dyn Tick> = counting.clone();
        let _handle = ticker.register(&entry);

        assert!(wait_for(|| counting.0.load(Ordering::Relaxed) >= 3));
    }

    #[test]
    fn deregistered_entries_are_not_ticked() {
        let ticker = Ticker::spawn(Duration::from_secs(3600)).unwrap();
        let counting = Arc::new(Counting::default());
        let entry: Arc<dyn Tick> = counting.clone();
        let handle = ticker.register(&entry);

        ticker.tick_now();
        assert_eq!(counting.0.load(Ordering::Relaxed), 1);

        ticker.deregister(&handle);
        ticker.tick_now();
        assert_eq!(counting.0.load(Ordering::Relaxed), 1);
        assert_eq!(ticker.len(), 0);
    }

    #[test]
    fn dropped_entries_are_pruned() {
        let ticker = Ticker::spawn(Duration::from_secs(3600)).unwrap();
        let entry: Arc<dyn Tick> = Arc::new(Counting::default());
        let _handle = ticker.register(&entry);
        assert_eq!(ticker.len(), 1);

        drop(entry);
        ticker.tick_now();
        assert_eq!(ticker.len(), 0);
    }

    #[test]
    fn drop_stops_the_thread_promptly() {
        let ticker = Ticker::spawn(Duration::from_secs(3600)).unwrap();
        let started = Instant::now();
        drop(ticker);
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
