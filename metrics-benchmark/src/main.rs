use getopts::Options;
use hdrhistogram::Histogram as HdrHistogram;
use log::{error, info};
use metrics_instruments::{Metric, Registry, TimeUnit};
use portable_atomic::AtomicU64;
use quanta::{Clock, Instant as QuantaInstant};
use std::{
    env,
    ops::Sub,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

const LOOP_SAMPLE: u64 = 1000;

/// Reads every metric in the registry, the way a reporter would on each pass.
pub struct Controller {
    registry: Arc<Registry>,
}

impl Controller {
    /// Snapshots every histogram and timer, and reads every counter and meter.
    pub fn report(&self) -> usize {
        let metrics = self.registry.all_metrics();
        for metric in metrics.values() {
            match metric {
                Metric::Counter(counter) => {
                    let _ = counter.count();
                }
                Metric::Gauge(gauge) => {
                    let _ = gauge.value();
                }
                Metric::Histogram(histogram) => {
                    let _ = histogram.snapshot().p99();
                }
                Metric::Meter(meter) => {
                    let _ = meter.one_minute_rate();
                }
                Metric::Timer(timer) => {
                    let _ = timer.snapshot().p99();
                    let _ = timer.one_minute_rate();
                }
            }
        }
        metrics.len()
    }
}

struct Generator {
    registry: Arc<Registry>,
    t0: Option<QuantaInstant>,
    hist: HdrHistogram<u64>,
    done: Arc<AtomicBool>,
    rate_counter: Arc<AtomicU64>,
}

impl Generator {
    fn new(
        registry: Arc<Registry>,
        done: Arc<AtomicBool>,
        rate_counter: Arc<AtomicU64>,
    ) -> Result<Generator, hdrhistogram::CreationError> {
        Ok(Generator {
            registry,
            t0: None,
            hist: HdrHistogram::<u64>::new_with_bounds(1, u64::MAX, 3)?,
            done,
            rate_counter,
        })
    }

    fn run_slow(&mut self) {
        let clock = Clock::new();
        let mut loop_counter = 0;

        loop {
            loop_counter += 1;

            let t1 = clock.recent();

            if let Some(t0) = self.t0 {
                let start = if loop_counter % LOOP_SAMPLE == 0 { Some(clock.now()) } else { None };

                // Every operation goes through a registry lookup.
                if let Ok(counter) = self.registry.counter("ok") {
                    counter.inc();
                }
                if let Ok(meter) = self.registry.meter("events") {
                    meter.mark();
                }
                if let Ok(timer) = self.registry.timer("ok") {
                    timer.record(t1.sub(t0));
                }

                if let Some(val) = start {
                    let delta = clock.now() - val;
                    self.hist.saturating_record(delta.as_nanos() as u64);

                    // We also increment our global counter for the sample rate here.
                    self.rate_counter.fetch_add(LOOP_SAMPLE * 3, Ordering::AcqRel);

                    if self.done.load(Ordering::Relaxed) {
                        break;
                    }
                }
            }

            self.t0 = Some(t1);
        }
    }

    fn run_fast(&mut self) {
        let clock = Clock::new();
        let mut loop_counter = 0;

        let handles = (
            self.registry.counter("ok"),
            self.registry.meter("events"),
            self.registry.timer("ok"),
        );
        let (counter, meter, timer) = match handles {
            (Ok(counter), Ok(meter), Ok(timer)) => (counter, meter, timer),
            _ => {
                error!("Failed to register benchmark instruments.");
                return;
            }
        };

        loop {
            loop_counter += 1;

            let t1 = clock.recent();

            if let Some(t0) = self.t0 {
                let start = if loop_counter % LOOP_SAMPLE == 0 { Some(clock.now()) } else { None };

                counter.inc();
                meter.mark();
                timer.update(t1.sub(t0).as_nanos() as i64, TimeUnit::Nanoseconds);

                if let Some(val) = start {
                    let delta = clock.now() - val;
                    self.hist.saturating_record(delta.as_nanos() as u64);

                    // We also increment our global counter for the sample rate here.
                    self.rate_counter.fetch_add(LOOP_SAMPLE * 3, Ordering::AcqRel);

                    if self.done.load(Ordering::Relaxed) {
                        break;
                    }
                }
            }

            self.t0 = Some(t1);
        }
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        info!(
            "    sender latency: min: {:8} p50: {:8} p95: {:8} p99: {:8} p999: {:8} max: {:8}",
            nanos_to_readable(self.hist.min()),
            nanos_to_readable(self.hist.value_at_percentile(50.0)),
            nanos_to_readable(self.hist.value_at_percentile(95.0)),
            nanos_to_readable(self.hist.value_at_percentile(99.0)),
            nanos_to_readable(self.hist.value_at_percentile(99.9)),
            nanos_to_readable(self.hist.max())
        );
    }
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

pub fn opts() -> Options {
    let mut opts = Options::new();

    opts.optopt("d", "duration", "number of seconds to run the benchmark", "INTEGER");
    opts.optopt(
        "m",
        "mode",
        "whether or run the benchmark in slow or fast mode (registry lookups vs held handles)",
        "STRING",
    );
    opts.optopt("p", "producers", "number of producers", "INTEGER");
    opts.optflag("h", "help", "print this help menu");

    opts
}

fn parse_opt<T: std::str::FromStr>(matches: &getopts::Matches, name: &str, default: T) -> Option<T> {
    match matches.opt_str(name) {
        None => Some(default),
        Some(raw) => match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                error!("Invalid value for --{}: {}", name, raw);
                None
            }
        },
    }
}

fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = opts();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            error!("Failed to parse command line args: {}", f);
            return;
        }
    };

    if matches.opt_present("help") {
        print_usage(program, &opts);
        return;
    }

    info!("metrics-instruments benchmark");

    let (seconds, producers) =
        match (parse_opt(&matches, "duration", 60u64), parse_opt(&matches, "producers", 1usize)) {
            (Some(seconds), Some(producers)) => (seconds, producers),
            _ => return,
        };
    let mode = matches
        .opt_str("mode")
        .map(|s| if s.to_ascii_lowercase() == "fast" { "fast" } else { "slow" })
        .unwrap_or("slow")
        .to_owned();

    info!("duration: {}s", seconds);
    info!("producers: {}", producers);
    info!("mode: {}", mode);

    let registry = match Registry::builder().build() {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Failed to build registry: {}", e);
            return;
        }
    };
    let controller = Controller { registry: Arc::clone(&registry) };

    info!("registry configured");

    // Spin up our sample producers.
    let done = Arc::new(AtomicBool::new(false));
    let rate_counter = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::new();

    for _ in 0..producers {
        let mut gen = match Generator::new(Arc::clone(&registry), done.clone(), rate_counter.clone()) {
            Ok(gen) => gen,
            Err(e) => {
                error!("Failed to create latency histogram: {}", e);
                return;
            }
        };
        let mode = mode.clone();
        let handle = thread::spawn(move || {
            if mode == "fast" {
                gen.run_fast();
            } else {
                gen.run_slow();
            }
        });

        handles.push(handle);
    }

    thread::spawn(|| loop {
        thread::sleep(Duration::from_millis(10));
        quanta::set_recent(quanta::Instant::now());
    });

    // Poll the controller to figure out the sample rate.
    let mut total = 0;
    let mut t0 = Instant::now();

    let mut report_hist = match HdrHistogram::<u64>::new_with_bounds(1, u64::MAX, 3) {
        Ok(hist) => hist,
        Err(e) => {
            error!("Failed to create report histogram: {}", e);
            return;
        }
    };
    for _ in 0..seconds {
        let t1 = Instant::now();

        let start = Instant::now();
        controller.report();
        let end = Instant::now();
        report_hist.saturating_record((end - start).as_nanos() as u64);

        let turn_total = rate_counter.load(Ordering::Acquire);
        let turn_delta = turn_total - total;
        total = turn_total;
        let rate = turn_delta as f64 / (t1 - t0).as_secs_f64();

        info!("sample ingest rate: {:.0} samples/sec", rate);
        t0 = t1;
        thread::sleep(Duration::new(1, 0));
    }

    info!("--------------------------------------------------------------------------------");
    info!(" ingested samples total: {}", total);
    info!(
        "     registry report: min: {:8} p50: {:8} p95: {:8} p99: {:8} p999: {:8} max: {:8}",
        nanos_to_readable(report_hist.min()),
        nanos_to_readable(report_hist.value_at_percentile(50.0)),
        nanos_to_readable(report_hist.value_at_percentile(95.0)),
        nanos_to_readable(report_hist.value_at_percentile(99.0)),
        nanos_to_readable(report_hist.value_at_percentile(99.9)),
        nanos_to_readable(report_hist.max())
    );

    // Wait for the producers to finish so we can get their stats too.
    done.store(true, Ordering::SeqCst);
    for handle in handles {
        let _ = handle.join();
    }
}

fn nanos_to_readable(t: u64) -> String {
    let f = t as f64;
    if f < 1_000.0 {
        format!("{}ns", f)
    } else if f < 1_000_000.0 {
        format!("{:.0}μs", f / 1_000.0)
    } else if f < 2_000_000_000.0 {
        format!("{:.2}ms", f / 1_000_000.0)
    } else {
        format!("{:.3}s", f / 1_000_000_000.0)
    }
}
