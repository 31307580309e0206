//! Logging to a serial debug port
//!
//! Lines are written the way the modem firmware developers are used to:
//! `I (1234) sim9_svc::modem: Powering on`, the marker being the level.

use core::fmt::{self, Write};

use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use ::log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

type Sink = Box<dyn Write + Send>;

static LOGGER: SerialLogger = SerialLogger::new();

struct State {
    sink: Option<Sink>,
    level: LevelFilter,
}

pub struct SerialLogger {
    state: Mutex<State>,
    start: OnceLock<Instant>,
}

impl SerialLogger {
    /// Public in case user code would like to compose this logger in their own one
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(State {
                sink: None,
                level: LevelFilter::Off,
            }),
            start: OnceLock::new(),
        }
    }

    /// Install the global logger, writing to `sink` up to `level`.
    pub fn initialize_default(
        sink: impl Write + Send + 'static,
        level: LevelFilter,
    ) -> Result<(), SetLoggerError> {
        ::log::set_logger(&LOGGER)?;

        LOGGER.initialize(sink, level);

        Ok(())
    }

    pub fn initialize(&self, sink: impl Write + Send + 'static, level: LevelFilter) {
        if let Ok(mut state) = self.state.lock() {
            state.sink = Some(Box::new(sink));
            state.level = level;
        }

        self.start.get_or_init(Instant::now);

        ::log::set_max_level(level);
    }

    pub fn get_max_level(&self) -> LevelFilter {
        self.state
            .lock()
            .map(|state| state.level)
            .unwrap_or(LevelFilter::Off)
    }

    fn get_marker(level: Level) -> &'static str {
        match level {
            Level::Error => "E",
            Level::Warn => "W",
            Level::Info => "I",
            Level::Debug => "D",
            Level::Trace => "V",
        }
    }

    fn timestamp(&self) -> u128 {
        self.start.get_or_init(Instant::now).elapsed().as_millis()
    }

    /// Format one record, terminated by a new line.
    pub fn write_record(out: &mut dyn Write, timestamp: u128, record: &Record) -> fmt::Result {
        writeln!(
            out,
            "{} ({}) {}: {}",
            Self::get_marker(record.level()),
            timestamp,
            record.target(),
            record.args()
        )
    }
}

impl Default for SerialLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.get_max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = self.timestamp();

        if let Ok(mut state) = self.state.lock() {
            if let Some(sink) = state.sink.as_mut() {
                // Nowhere to report a failing debug port
                let _ = Self::write_record(sink.as_mut(), timestamp, record);
            }
        }
    }

    fn flush(&self) {}
}
