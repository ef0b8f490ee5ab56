//! Central parsing of the driver parameters.
//!
//! The parameters use the same shape as the kernel command line, e.g.
//! `-pstate-strict 1 -loglevel Debug`.

use alloc::string::String;

use log::LevelFilter;

use crate::drivers::error::CpufreqError;
use crate::logging;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Params {
	/// Verify every transition by polling the status register.
	pub pstate_strict: bool,
	/// Overrides the compile-time log level.
	pub log_level: Option<LevelFilter>,
}

impl Params {
	pub fn parse(cmdline: &str) -> Result<Self, CpufreqError> {
		let mut params = Self::default();

		let words = shell_words::split(cmdline).map_err(|_| CpufreqError::InvalidInput)?;
		debug!("cpufreq params = {words:?}");

		let mut words = words.into_iter();
		while let Some(word) = words.next() {
			match word.as_str() {
				"-pstate-strict" => {
					let value = expect_arg(words.next(), &word)?;
					let value: u32 = value.parse().map_err(|_| CpufreqError::InvalidInput)?;
					params.pstate_strict = value != 0;
				}
				"-loglevel" => {
					let value = expect_arg(words.next(), &word)?;
					params.log_level =
						Some(logging::parse_level(&value).ok_or(CpufreqError::InvalidInput)?);
				}
				_ => {
					warn!("Unknown cpufreq option: {word} [{cmdline}]");
				}
			}
		}

		Ok(params)
	}
}

fn expect_arg(arg: Option<String>, name: &str) -> Result<String, CpufreqError> {
	arg.ok_or_else(|| {
		warn!("The argument '{name}' requires a value but none was supplied");
		CpufreqError::InvalidInput
	})
}
