use core::fmt;

use hermit_sync::OnceCell;
use log::{LevelFilter, Metadata, Record, SetLoggerError, set_logger, set_max_level};

/// Sink for formatted log lines, provided by the host.
pub trait Console: Sync {
	fn write_fmt(&self, args: fmt::Arguments<'_>);
}

static CONSOLE: OnceCell<&'static dyn Console> = OnceCell::new();

/// Data structure to filter driver messages
struct KernelLogger;

impl log::Log for KernelLogger {
	fn enabled(&self, _: &Metadata<'_>) -> bool {
		true
	}

	fn flush(&self) {
		// nothing to do
	}

	fn log(&self, record: &Record<'_>) {
		if self.enabled(record.metadata()) {
			if let Some(console) = CONSOLE.get() {
				console.write_fmt(format_args!(
					"[{}][{}] {}\n",
					record.level(),
					record.target(),
					record.args()
				));
			}
		}
	}
}

static LOGGER: KernelLogger = KernelLogger;

/// Determines the default [`LevelFilter`] at compile time.
pub fn default_level() -> LevelFilter {
	let log_level: Option<&'static str> = option_env!("HERMIT_LOG_LEVEL_FILTER");
	log_level.and_then(parse_level).unwrap_or(LevelFilter::Info)
}

pub(crate) fn parse_level(name: &str) -> Option<LevelFilter> {
	match name {
		"Error" => Some(LevelFilter::Error),
		"Debug" => Some(LevelFilter::Debug),
		"Off" => Some(LevelFilter::Off),
		"Trace" => Some(LevelFilter::Trace),
		"Warn" => Some(LevelFilter::Warn),
		"Info" => Some(LevelFilter::Info),
		_ => None,
	}
}

/// Installs the driver logger.
///
/// `level` overrides the compile-time default (see [`default_level`]).
pub fn init(console: &'static dyn Console, level: Option<LevelFilter>) -> Result<(), SetLoggerError> {
	// A second call keeps the first console, just like the logger itself.
	CONSOLE.set(console).ok();
	set_logger(&LOGGER)?;
	set_max_level(level.unwrap_or_else(default_level));
	Ok(())
}

macro_rules! infoheader {
	($str:expr) => {{
		info!("");
		info!("{:=^70}", $str);
	}};
}

macro_rules! infoentry {
	($str:expr, $rhs:expr) => (infoentry!($str, "{}", $rhs));
	($str:expr, $($arg:tt)+) => (info!("{:25}{}", concat!($str, ":"), format_args!($($arg)+)));
}

macro_rules! infofooter {
	() => {{
		info!("{:=^70}", '=');
		info!("");
	}};
}
