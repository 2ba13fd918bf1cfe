use getopts::Options;
use hdrhistogram::{CreationError, Histogram as HdrHistogram};
use log::{debug, error, info};
use meters::{
    Measurement, MeterId, MeterKind, MeterRegistry, Metadata, Observer, Statistic, TimeUnit,
};
use portable_atomic::AtomicU64;
use quanta::{Clock, Instant as QuantaInstant};
use std::{
    env,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

const LOOP_SAMPLE: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Meters are resolved once and the handles reused.
    Handle,
    /// Meters are resolved through the registry on every iteration.
    Lookup,
}

/// Walks the registry the way an exporter would, logging what it sees at debug level.
struct LoggingObserver {
    unit: TimeUnit,
    meters: usize,
    measurements: usize,
}

impl LoggingObserver {
    fn new(unit: TimeUnit) -> Self {
        Self { unit, meters: 0, measurements: 0 }
    }
}

impl Observer for LoggingObserver {
    fn observe_meter(
        &mut self,
        id: &MeterId,
        kind: MeterKind,
        _metadata: Option<&Metadata>,
        measurements: &[Measurement],
    ) {
        self.meters += 1;
        self.measurements += measurements.len();
        for m in measurements {
            let label = match (kind, m.statistic) {
                (MeterKind::Timer | MeterKind::FunctionTimer, Statistic::TotalTime | Statistic::Max)
                | (MeterKind::TimeGauge, Statistic::Value) => self.unit.as_canonical_label(),
                _ => "",
            };
            debug!("{} ({}) {}={}{}", id, kind, m.statistic, m.value, label);
        }
    }
}

fn latency_histogram() -> Result<HdrHistogram<u64>, CreationError> {
    HdrHistogram::<u64>::new_with_bounds(1, u64::MAX, 3)
}

struct Generator {
    id: usize,
    registry: Arc<MeterRegistry>,
    t0: Option<QuantaInstant>,
    in_flight: Arc<AtomicU64>,
    hist: HdrHistogram<u64>,
    done: Arc<AtomicBool>,
    rate_counter: Arc<AtomicU64>,
}

impl Generator {
    fn new(
        id: usize,
        registry: Arc<MeterRegistry>,
        done: Arc<AtomicBool>,
        rate_counter: Arc<AtomicU64>,
    ) -> Result<Generator, CreationError> {
        Ok(Generator {
            id,
            registry,
            t0: None,
            in_flight: Arc::new(AtomicU64::new(0)),
            hist: latency_histogram()?,
            done,
            rate_counter,
        })
    }

    fn register_gauge(&self) -> Result<(), meters::Error> {
        let tags = [("producer", self.id.to_string())];
        self.registry
            .gauge("benchmark.in_flight", &tags, &self.in_flight, |v| {
                v.load(Ordering::Relaxed) as f64
            })
            .map(|_| ())
    }

    fn run_lookup(&mut self) -> Result<(), meters::Error> {
        let clock = Clock::new();
        let mut loop_counter = 0;
        self.register_gauge()?;

        loop {
            loop_counter += 1;
            self.in_flight.fetch_add(1, Ordering::Relaxed);

            let t1 = clock.recent();

            if let Some(t0) = self.t0 {
                let start = if loop_counter % LOOP_SAMPLE == 0 { Some(clock.now()) } else { None };

                self.registry.counter("benchmark.ok", ())?.increment();
                self.registry.timer("benchmark.loop", ())?.record(t1 - t0);
                self.registry.summary("benchmark.batch", ())?.record(loop_counter as f64);

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

        Ok(())
    }

    fn run_handle(&mut self) -> Result<(), meters::Error> {
        let clock = Clock::new();
        let mut loop_counter = 0;
        self.register_gauge()?;

        let counter = self.registry.counter("benchmark.ok", ())?;
        let timer = self.registry.timer("benchmark.loop", ())?;
        let summary = self.registry.summary("benchmark.batch", ())?;

        loop {
            loop_counter += 1;
            self.in_flight.fetch_add(1, Ordering::Relaxed);

            let t1 = clock.recent();

            if let Some(t0) = self.t0 {
                let start = if loop_counter % LOOP_SAMPLE == 0 { Some(clock.now()) } else { None };

                counter.increment();
                timer.record(t1 - t0);
                summary.record(loop_counter as f64);

                if let Some(val) = start {
                    let delta = clock.now() - val;
                    self.hist.saturating_record(delta.as_nanos() as u64);

                    self.rate_counter.fetch_add(LOOP_SAMPLE * 3, Ordering::AcqRel);

                    if self.done.load(Ordering::Relaxed) {
                        break;
                    }
                }
            }

            self.t0 = Some(t1);
        }

        Ok(())
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
        "whether producers hold meter handles or look meters up every time (handle vs lookup)",
        "STRING",
    );
    opts.optopt("p", "producers", "number of producers", "INTEGER");
    opts.optopt("u", "unit", "time unit for observed durations (e.g. microseconds)", "STRING");
    opts.optflag("h", "help", "print this help menu");

    opts
}

fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("meters-benchmark");
    let opts = opts();

    let matches = match opts.parse(args.iter().skip(1)) {
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

    info!("meters benchmark");

    let seconds: u64 =
        match matches.opt_str("duration").unwrap_or_else(|| "60".to_owned()).parse() {
            Ok(seconds) => seconds,
            Err(e) => {
                error!("Invalid duration: {}", e);
                return;
            }
        };
    let producers: usize =
        match matches.opt_str("producers").unwrap_or_else(|| "1".to_owned()).parse() {
            Ok(producers) => producers,
            Err(e) => {
                error!("Invalid producer count: {}", e);
                return;
            }
        };
    let mode = match matches.opt_str("mode").map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("lookup") => Mode::Lookup,
        _ => Mode::Handle,
    };

    let unit = match matches.opt_str("unit") {
        None => TimeUnit::Microseconds,
        Some(s) => match TimeUnit::from_string(&s.to_ascii_lowercase()) {
            Some(unit) => unit,
            None => {
                error!("Invalid time unit: {}", s);
                return;
            }
        },
    };

    info!("duration: {}s", seconds);
    info!("producers: {}", producers);
    info!("mode: {:?}", mode);
    info!("unit: {}", unit.as_str());

    let registry =
        Arc::new(MeterRegistry::builder().with_common_tags(&[("app", "benchmark")]).build());

    info!("registry configured");

    // Spin up our sample producers.
    let done = Arc::new(AtomicBool::new(false));
    let rate_counter = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::new();

    for id in 0..producers {
        let mut gen = match Generator::new(id, registry.clone(), done.clone(), rate_counter.clone())
        {
            Ok(gen) => gen,
            Err(e) => {
                error!("Failed to create latency histogram: {}", e);
                return;
            }
        };
        let handle = thread::spawn(move || {
            let result = match mode {
                Mode::Handle => gen.run_handle(),
                Mode::Lookup => gen.run_lookup(),
            };
            if let Err(e) = result {
                error!("producer {} stopped: {}", id, e);
            }
        });

        handles.push(handle);
    }

    thread::spawn(|| loop {
        thread::sleep(Duration::from_millis(10));
        quanta::set_recent(quanta::Instant::now());
    });

    // Observe the registry once per second, the way an exporter would, and track how long it takes.
    let mut total = 0;
    let mut t0 = Instant::now();

    let mut observe_hist = match latency_histogram() {
        Ok(hist) => hist,
        Err(e) => {
            error!("Failed to create latency histogram: {}", e);
            return;
        }
    };
    for _ in 0..seconds {
        let t1 = Instant::now();

        let mut observer = LoggingObserver::new(unit);
        let start = Instant::now();
        registry.observe(&mut observer, unit);
        let end = Instant::now();
        observe_hist.saturating_record((end - start).as_nanos() as u64);

        let turn_total = rate_counter.load(Ordering::Acquire);
        let turn_delta = turn_total - total;
        total = turn_total;
        let rate = turn_delta as f64 / (t1 - t0).as_secs_f64();

        info!(
            "sample ingest rate: {:.0} samples/sec ({} meters, {} measurements)",
            rate, observer.meters, observer.measurements
        );
        t0 = t1;
        thread::sleep(Duration::new(1, 0));
    }

    info!("--------------------------------------------------------------------------------");
    info!(" ingested samples total: {}", total);
    info!(
        "  registry observe: min: {:8} p50: {:8} p95: {:8} p99: {:8} p999: {:8} max: {:8}",
        nanos_to_readable(observe_hist.min()),
        nanos_to_readable(observe_hist.value_at_percentile(50.0)),
        nanos_to_readable(observe_hist.value_at_percentile(95.0)),
        nanos_to_readable(observe_hist.value_at_percentile(99.0)),
        nanos_to_readable(observe_hist.value_at_percentile(99.9)),
        nanos_to_readable(observe_hist.max())
    );

    // Wait for the producers to finish so we can get their stats too.
    done.store(true, Ordering::SeqCst);
    for handle in handles {
        let _ = handle.join();
    }

    if let Ok(counter) = registry.find("benchmark.ok").counter() {
        info!(" counter total: {}", counter.count());
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
