//! Architecture-specific abstractions.
//!
//! The driver talks to the machine only through the traits in this module.
//! On x86-64 the native implementations access the running processor
//! directly. Everything else (including the test suite) provides its own.

use bitflags::bitflags;

use crate::smp::CoreId;

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "x86_64")]
pub use self::x86_64::kernel::processor::NativeProcessor;
#[cfg(target_arch = "x86_64")]
pub use self::x86_64::kernel::registers::NativeRegisters;
#[cfg(target_arch = "x86_64")]
pub use self::x86_64::kernel::smp::UniProcessor;

/// Raw register access on the core the implementation runs on.
pub trait Registers {
	fn read_msr(&self, msr: u32) -> u64;

	fn write_msr(&self, msr: u32, value: u64);

	/// Reads `bit_width` bits (8, 16 or 32) from an I/O port.
	fn read_port(&self, port: u16, bit_width: u8) -> u32;

	/// Writes `bit_width` bits (8, 16 or 32) to an I/O port.
	fn write_port(&self, port: u16, value: u32, bit_width: u8);
}

bitflags! {
	/// CPU features relevant for frequency scaling.
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub struct CpuFeatures: u32 {
		/// Enhanced Intel SpeedStep Technology
		const EST = 1 << 0;
		/// The TSC runs at a constant rate across P-states.
		const CONSTANT_TSC = 1 << 1;
		/// APERF/MPERF are available.
		const APERFMPERF = 1 << 2;
	}
}

/// Properties and timing services of the processor.
pub trait Processor {
	fn features(&self, core: CoreId) -> CpuFeatures;

	/// Measured processor frequency in kHz, if known.
	fn cpu_khz(&self) -> Option<u32>;

	/// Delay execution by the given number of microseconds using busy-waiting.
	fn udelay(&self, usecs: u64);
}
