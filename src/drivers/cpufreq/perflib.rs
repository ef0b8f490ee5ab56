//! Interface to the ACPI processor performance library.
//!
//! The performance library evaluates `_PCT`, `_PSS` and `_PSD` and hands the
//! result to the driver when a core is registered. The driver only reads the
//! description, except for the current state index and the `control` values,
//! which the PHC interface edits in place.

use alloc::vec::Vec;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::drivers::cpufreq::policy::SharedType;
use crate::drivers::error::CpufreqError;
use crate::smp::{CoreId, CoreSet};

/// ACPI Generic Address Structure address space IDs we care about.
#[derive(TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(u8)]
pub enum AddressSpace {
	SystemMemory = 0,
	SystemIo = 1,
	PciConfig = 2,
	EmbeddedController = 3,
	SmBus = 4,
	FixedHardware = 0x7f,
}

/// A `_PCT` register description.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerformanceRegister {
	pub space_id: u8,
	pub bit_width: u8,
	pub bit_offset: u8,
	pub address: u64,
}

impl PerformanceRegister {
	pub const fn fixed_hardware() -> Self {
		Self {
			space_id: AddressSpace::FixedHardware as u8,
			bit_width: 0,
			bit_offset: 0,
			address: 0,
		}
	}

	pub const fn system_io(port: u16, bit_width: u8) -> Self {
		Self {
			space_id: AddressSpace::SystemIo as u8,
			bit_width,
			bit_offset: 0,
			address: port as u64,
		}
	}

	pub fn address_space(&self) -> Option<AddressSpace> {
		AddressSpace::try_from(self.space_id).ok()
	}
}

/// One `_PSS` entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerformanceState {
	/// Core frequency in MHz.
	pub core_frequency: u64,
	/// Power dissipation in mW.
	pub power: u64,
	/// Worst-case transition latency in us.
	pub transition_latency: u64,
	/// Bus master latency in us.
	pub bus_master_latency: u64,
	pub control: u64,
	pub status: u64,
}

impl PerformanceState {
	pub const fn new(core_frequency: u64, control: u64, status: u64) -> Self {
		Self {
			core_frequency,
			power: 0,
			transition_latency: 0,
			bus_master_latency: 0,
			control,
			status,
		}
	}
}

/// Everything the performance library knows about one core.
#[derive(Clone, Debug)]
pub struct PerformanceData {
	/// Index into `states` of the state the core is believed to be in.
	pub state: usize,
	pub states: Vec<PerformanceState>,
	pub control_register: PerformanceRegister,
	pub status_register: PerformanceRegister,
	/// Coordination type of the `_PSD` domain.
	pub shared_type: SharedType,
	/// All cores of the `_PSD` domain.
	pub shared_cpu_map: CoreSet,
}

impl PerformanceData {
	pub fn state_count(&self) -> usize {
		self.states.len()
	}
}

/// The ACPI processor performance library.
pub trait PerformanceSource {
	/// Evaluates the performance objects of `core`.
	fn register_performance(&self, core: CoreId) -> Result<PerformanceData, CpufreqError>;

	fn unregister_performance(&self, core: CoreId);

	/// Tells the firmware that the OS has taken over P-state control.
	fn notify_smm(&self) {}

	/// Frequency limit (kHz) currently imposed by the firmware via `_PPC`.
	fn bios_limit(&self, _core: CoreId) -> Option<u32> {
		None
	}
}
