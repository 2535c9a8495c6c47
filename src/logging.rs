// only the client/server binaries call init(); library code never touches
// logging directly

use std::time::SystemTime;

use log::{Level, LevelFilter, Log, Metadata, Record};
use nu_ansi_term::ansi::RESET;
use nu_ansi_term::{Color, Style};

struct AnsiLogger;

impl Log for AnsiLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let time = humantime::format_rfc3339_millis(SystemTime::now());
        let dim = Style::new().dimmed().prefix();

        let color = match record.level() {
            Level::Trace => Color::Purple,
            Level::Debug => Color::Blue,
            Level::Info => Color::Green,
            Level::Warn => Color::Yellow,
            Level::Error => Color::Red,
        };

        eprintln!(
            "{dim}{time}{RESET} {}{:5}{RESET} {}{}{RESET}{dim}:{RESET} {}",
            color.bold().prefix(),
            record.level(),
            Style::new().bold().prefix(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) {
    if log::set_logger(&AnsiLogger).is_ok() {
        log::set_max_level(level);
    }
}

// RUST_LOG takes priority over a repeated -v count
pub fn level_from_verbosity(verbose_count: u8) -> LevelFilter {
    if let Ok(from_env) = std::env::var("RUST_LOG") {
        if let Ok(filter) = from_env.parse() {
            return filter;
        }
    }

    match verbose_count {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
