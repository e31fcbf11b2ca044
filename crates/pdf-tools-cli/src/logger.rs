use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};

/// Timestamped log lines on stderr, so stdout stays free for results
pub struct CliLogger {
    level: LevelFilter,
}

impl CliLogger {
    /// `-v` raises the level from warnings to info, debug, then trace
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        Self { level }
    }

    pub fn init(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl log::Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let target = if record.level() >= Level::Debug {
                format!(" [{}]", record.target())
            } else {
                String::new()
            };
            eprintln!(
                "{} {:<5}{} {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                target,
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
