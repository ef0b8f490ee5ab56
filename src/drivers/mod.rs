//! A module containing the cpufreq driver and driver specific errors.

pub mod cpufreq;

/// A common error module for drivers.
/// [CpufreqError](error::CpufreqError) values will be
/// passed on to higher layers.
pub mod error {
	use thiserror::Error;

	#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
	pub enum CpufreqError {
		/// The platform tables cannot be used on this core.
		#[error("Platform does not provide usable P-states")]
		UnsupportedPlatform,

		/// No table entry satisfies the requested frequency.
		#[error("Requested frequency is not supported")]
		NotSupported,

		/// Strict mode gave up waiting for the hardware to switch.
		#[error("P-state transition did not complete")]
		TransitionTimeout,

		#[error("Invalid input")]
		InvalidInput,

		#[error("Out of memory")]
		OutOfMemory,

		/// The core is not managed by this driver or lacks the required
		/// access method.
		#[error("No such device")]
		NoDevice,
	}
}
