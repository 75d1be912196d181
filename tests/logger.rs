//! Tests for the dispatch core.

use driftlog::logger::{Terminal, add_fields, add_pid, add_unique_id};
use driftlog::record::Fields;
use driftlog::{
    Error, FlushOutcome, Handler, Level, LevelFilter, Logger, MemorySink, Record, SinkHandler,
    TerminalAction, TextFormatter,
};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Records what it receives; optionally fails or stalls.
#[derive(Default)]
struct Spy {
    filter: LevelFilter,
    seen: Mutex<Vec<(Level, String)>>,
    flushes: AtomicUsize,
    closes: AtomicUsize,
    fail_handle: bool,
    flush_delay: Option<Duration>,
}

impl Spy {
    fn new(filter: impl Into<LevelFilter>) -> Arc<Self> {
        Arc::new(Self {
            filter: filter.into(),
            ..Self::default()
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_handle: true,
            ..Self::default()
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            flush_delay: Some(delay),
            ..Self::default()
        })
    }

    fn messages(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Handler for Spy {
    fn is_handling(&self, level: Level) -> bool {
        self.filter.accepts(level)
    }

    fn handle(&self, record: &Record) -> Result<(), Error> {
        if self.fail_handle {
            return Err(io::Error::other("disk full").into());
        }
        self.seen
            .lock()
            .unwrap()
            .push((record.level, record.message.clone()));
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        if let Some(delay) = self.flush_delay {
            thread::sleep(delay);
        }
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn quiet() -> driftlog::LoggerBuilder {
    Logger::builder().terminal_action(TerminalAction::Noop)
}

#[test]
fn builder_defaults() {
    let logger = Logger::builder().build();
    assert_eq!(logger.name(), "application");
    assert_eq!(logger.min_level(), Level::Trace);
    assert_eq!(logger.handler_count(), 0);
}

#[test]
fn log_without_handlers_is_silent() {
    let logger = quiet().build();
    logger.info("nobody listens");
    assert!(logger.last_err().is_none());
}

#[test]
fn handler_only_sees_levels_it_accepts() {
    let spy = Spy::new(Level::Warn);
    let logger = quiet().handler(spy.clone()).build();

    logger.debug("debug");
    logger.info("info");
    logger.warn("warn");
    logger.error("error");

    assert_eq!(spy.messages(), ["warn", "error"]);
}

#[test]
fn level_set_selects_exact_levels() {
    let spy = Spy::new([Level::Info, Level::Error]);
    let logger = quiet().handler(spy.clone()).build();

    for level in Level::all() {
        if !level.is_terminal() {
            logger.log(level, level.as_str());
        }
    }

    assert_eq!(spy.messages(), ["info", "error"]);
}

#[test]
fn logger_level_drops_before_handlers() {
    let spy = Spy::new(LevelFilter::all());
    let logger = quiet().level(Level::Notice).handler(spy.clone()).build();

    logger.info("below");
    logger.print("printed");
    logger.warnf(format_args!("{} items", 3));

    assert_eq!(spy.messages(), ["printed", "3 items"]);
}

#[test]
fn every_handler_receives_the_record_in_order() {
    let first = Spy::new(LevelFilter::all());
    let second = Spy::new(LevelFilter::all());
    let logger = quiet().build();
    logger.add_handler(first.clone());
    logger.add_handler(second.clone());

    logger.info("one");
    logger.info("two");

    assert_eq!(first.messages(), ["one", "two"]);
    assert_eq!(second.messages(), ["one", "two"]);
    assert_eq!(logger.handler_count(), 2);
}

#[test]
fn failing_handler_does_not_stop_the_rest() {
    let spy = Spy::new(LevelFilter::all());
    let logger = quiet()
        .handler(Spy::failing())
        .handler(spy.clone())
        .build();

    logger.info("still delivered");

    assert_eq!(spy.messages(), ["still delivered"]);
    assert!(matches!(logger.last_err(), Some(Error::Io(_))));
}

#[test]
fn last_err_is_cleared_once_read() {
    let logger = quiet().handler(Spy::failing()).build();
    logger.info("fails");

    assert!(logger.last_err().is_some());
    assert!(logger.last_err().is_none());
}

#[test]
fn flush_twice_succeeds() {
    let spy = Spy::new(LevelFilter::all());
    let logger = quiet().handler(spy.clone()).build();
    logger.info("x");

    logger.flush().unwrap();
    logger.flush().unwrap();

    assert_eq!(spy.flushes.load(Ordering::SeqCst), 2);
}

#[test]
fn close_reaches_every_handler() {
    let a = Spy::new(LevelFilter::all());
    let b = Spy::new(LevelFilter::all());
    let logger = quiet().handler(a.clone()).handler(b.clone()).build();

    logger.close().unwrap();

    assert_eq!(a.closes.load(Ordering::SeqCst), 1);
    assert_eq!(b.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn flush_timeout_returns_when_the_flush_overruns() {
    let logger = quiet().handler(Spy::slow(Duration::from_millis(300))).build();

    let start = Instant::now();
    let outcome = logger.flush_timeout(Duration::from_millis(10)).unwrap();

    assert_eq!(outcome, FlushOutcome::TimedOut);
    assert!(start.elapsed() < Duration::from_millis(250));
}

#[test]
fn flush_timeout_completes_fast_flushes() {
    let spy = Spy::new(LevelFilter::all());
    let logger = quiet().handler(spy.clone()).build();

    let outcome = logger.flush_timeout(Duration::from_secs(5)).unwrap();

    assert_eq!(outcome, FlushOutcome::Completed);
    assert_eq!(spy.flushes.load(Ordering::SeqCst), 1);
}

#[test]
fn flush_daemon_flushes_periodically() {
    let spy = Spy::new(LevelFilter::all());
    let logger = quiet().handler(spy.clone()).build();

    let daemon = logger.flush_daemon(Duration::from_millis(10)).unwrap();
    thread::sleep(Duration::from_millis(200));
    daemon.stop();

    let flushed = spy.flushes.load(Ordering::SeqCst);
    assert!(flushed >= 2, "only {flushed} flushes");
    thread::sleep(Duration::from_millis(50));
    assert_eq!(spy.flushes.load(Ordering::SeqCst), flushed);
}

#[test]
fn concurrent_records_stay_whole() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 500;

    let sink = MemorySink::new();
    let logger = quiet()
        .report_caller(false)
        .handler(
            SinkHandler::new(sink.clone(), LevelFilter::all())
                .with_formatter(TextFormatter::new().template("{message}")),
        )
        .build();

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let logger = logger.clone();
            thread::spawn(move || {
                for k in 0..PER_THREAD {
                    logger.infof(format_args!("worker-{t:02} record-{k:04} end"));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let lines = sink.lines();
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    for line in &lines {
        assert!(line.starts_with("worker-") && line.ends_with(" end"), "{line}");
        assert_eq!(line.len(), "worker-00 record-0000 end".len());
    }
    for t in 0..THREADS {
        let own: Vec<_> = lines
            .iter()
            .filter(|l| l.starts_with(&format!("worker-{t:02} ")))
            .collect();
        assert_eq!(own.len(), PER_THREAD);
        // Each worker's records keep their call order.
        assert!(own.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn fatal_writes_then_runs_exit_handlers_and_terminal_action() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let order = Arc::new(Mutex::new(Vec::new()));
    let spy = Spy::new(LevelFilter::all());

    let terminal_seen = Arc::clone(&seen);
    let terminal_order = Arc::clone(&order);
    let logger = Logger::builder()
        .handler(spy.clone())
        .terminal_action(TerminalAction::custom(move |t| {
            terminal_order.lock().unwrap().push("terminal");
            terminal_seen.lock().unwrap().push(t);
        }))
        .build();
    let exit_order = Arc::clone(&order);
    logger.register_exit_handler(move || exit_order.lock().unwrap().push("exit handler"));

    logger.fatal("cannot continue");

    assert_eq!(spy.messages(), ["cannot continue"]);
    assert_eq!(spy.flushes.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), [Terminal::Exit(1)]);
    assert_eq!(*order.lock().unwrap(), ["exit handler", "terminal"]);
}

#[test]
fn panic_level_hands_the_message_to_the_terminal_action() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);
    let logger = Logger::builder()
        .terminal_action(TerminalAction::custom(move |t| {
            captured.lock().unwrap().push(t);
        }))
        .build();

    logger.panicf(format_args!("bad state {}", 7));

    assert_eq!(
        *seen.lock().unwrap(),
        [Terminal::Panic("bad state 7".to_string())]
    );
}

#[test]
#[should_panic(expected = "invariant broken")]
fn panic_level_panics_by_default() {
    Logger::builder().build().panic("invariant broken");
}

#[test]
fn noop_terminal_action_only_writes() {
    let spy = Spy::new(LevelFilter::all());
    let logger = Logger::builder().handler(spy.clone()).build();
    logger.do_nothing_on_panic_fatal();

    logger.fatal("f");
    logger.panic("p");

    assert_eq!(spy.messages(), ["f", "p"]);
}

#[test]
fn processors_run_in_order_before_handlers() {
    let sink = MemorySink::new();
    let mut fields = Fields::new();
    fields.insert("service".into(), "api".into());

    let logger = quiet()
        .report_caller(false)
        .processor(add_fields(fields))
        .processor(|r: &mut Record| {
            let service = r.fields.get("service").cloned();
            r.add_extra("seen_service", service.unwrap_or_default());
        })
        .handler(
            SinkHandler::new(sink.clone(), LevelFilter::all())
                .with_formatter(TextFormatter::new().template("{message} {fields} {extra}")),
        )
        .build();

    logger.info("started");

    assert_eq!(
        sink.lines(),
        [r#"started {"service":"api"} {"seen_service":"api"}"#]
    );
}

#[test]
fn unique_id_and_pid_processors_fill_extra() {
    let sink = MemorySink::new();
    let logger = quiet()
        .handler(
            SinkHandler::new(sink.clone(), LevelFilter::all())
                .with_formatter(TextFormatter::new().template("{extra}")),
        )
        .build();
    logger.add_processors([
        Arc::new(add_unique_id("id")) as Arc<dyn driftlog::logger::Processor>,
        Arc::new(add_pid()),
    ]);

    logger.info("a");
    logger.info("b");

    let lines = sink.lines();
    let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    let second: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
    assert_eq!(first["pid"], std::process::id());
    assert_eq!(first["id"].as_str().unwrap().len(), 26);
    assert_ne!(first["id"], second["id"]);
}

#[test]
fn reset_processors_stops_enrichment() {
    let spy = Spy::new(LevelFilter::all());
    let logger = quiet().handler(spy.clone()).build();
    logger.add_processor(|r: &mut Record| r.message.push('!'));

    logger.info("loud");
    logger.reset_processors();
    logger.info("calm");

    assert_eq!(spy.messages(), ["loud!", "calm"]);
}

#[test]
fn record_builder_attaches_fields_and_errors() {
    let sink = MemorySink::new();
    let logger = quiet()
        .handler(
            SinkHandler::new(sink.clone(), LevelFilter::all())
                .with_formatter(TextFormatter::new().template("{level} {message} {fields}")),
        )
        .build();

    let err = io::Error::other("connection reset");
    logger
        .record()
        .field("attempt", 3)
        .error(&err)
        .error_msg("upload failed");

    assert_eq!(
        sink.lines(),
        [r#"ERROR upload failed {"attempt":3,"error":"connection reset"}"#]
    );
}

#[test]
fn record_builder_keeps_a_custom_time() {
    let sink = MemorySink::new();
    let logger = quiet()
        .handler(
            SinkHandler::new(sink.clone(), LevelFilter::all()).with_formatter(
                TextFormatter::new()
                    .template("{datetime}")
                    .time_format("%Y-%m-%d"),
            ),
        )
        .build();

    let when = chrono::DateTime::parse_from_rfc3339("2021-03-04T05:06:07+00:00")
        .unwrap()
        .with_timezone(&chrono::Local);
    logger.record().time(when).info("backfilled");

    assert_eq!(sink.lines(), [when.format("%Y-%m-%d").to_string()]);
}

#[test]
fn records_return_to_the_pool() {
    let logger = quiet().pool_capacity(4).build();
    assert_eq!(logger.pooled_records(), 0);

    logger.info("one");
    assert_eq!(logger.pooled_records(), 1);

    // An abandoned builder gives its record back too.
    drop(logger.record().field("unused", true));
    assert_eq!(logger.pooled_records(), 1);
}

#[test]
fn caller_points_at_the_logging_call() {
    let sink = MemorySink::new();
    let logger = quiet()
        .handler(
            SinkHandler::new(sink.clone(), LevelFilter::all())
                .with_formatter(TextFormatter::new().template("{caller}")),
        )
        .build();

    logger.info("here");

    let line = &sink.lines()[0];
    assert!(line.starts_with("tests/logger.rs:"), "{line}");
}

#[test]
fn error_value_stores_the_message_as_a_field() {
    let sink = MemorySink::new();
    let logger = quiet()
        .handler(
            SinkHandler::new(sink.clone(), LevelFilter::all())
                .with_formatter(TextFormatter::new().template("{message}|{fields}")),
        )
        .build();

    logger.error_value(&io::Error::other("timed out"));

    assert_eq!(sink.lines(), [r#"timed out|{"error":"timed out"}"#]);
}

#[test]
fn bad_time_format_surfaces_as_a_format_error() {
    let sink = MemorySink::new();
    let logger = quiet()
        .handler(
            SinkHandler::new(sink.clone(), LevelFilter::all())
                .with_formatter(TextFormatter::new().time_format("%Q")),
        )
        .build();

    logger.info("dropped");

    assert!(matches!(logger.last_err(), Some(Error::Format(_))));
    assert!(sink.is_empty());
}
