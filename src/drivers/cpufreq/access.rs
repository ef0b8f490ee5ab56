//! Hardware access to the performance control and status registers.
//!
//! A core is driven either through the Intel performance MSRs or through a
//! pair of I/O ports described by the platform. All accesses are wrapped in a
//! [`DriverCommand`] and executed on the cores the command names.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::{CpuFeatures, Registers};
use crate::config::{MSR_IA32_PERF_CTL, MSR_IA32_PERF_STATUS};
use crate::drivers::cpufreq::perflib::{AddressSpace, PerformanceData, PerformanceRegister};
use crate::drivers::cpufreq::table::{FrequencyTable, mhz_to_khz};
use crate::drivers::error::CpufreqError;
use crate::smp::{CoreSet, CrossCall};

/// Bits of the performance MSRs owned by the driver.
pub const INTEL_MSR_RANGE: u32 = 0xffff;
/// Voltage ID field of a control value.
pub const INTEL_MSR_VID_MASK: u32 = 0x00ff;
/// Frequency ID field of a control value.
pub const INTEL_MSR_FID_MASK: u32 = 0xff00;
pub const INTEL_MSR_FID_SHIFT: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IoAddr {
	pub port: u16,
	pub bit_width: u8,
}

impl IoAddr {
	fn from_register(reg: &PerformanceRegister) -> Result<Self, CpufreqError> {
		let port = u16::try_from(reg.address).map_err(|_| {
			debug!("I/O address {:#x} out of range", reg.address);
			CpufreqError::UnsupportedPlatform
		})?;

		match reg.bit_width {
			8 | 16 | 32 => Ok(Self {
				port,
				bit_width: reg.bit_width,
			}),
			width => {
				debug!("Unsupported I/O width {width}");
				Err(CpufreqError::UnsupportedPlatform)
			}
		}
	}
}

/// A single register as seen by a driver command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
	Msr(u32),
	Io(IoAddr),
}

impl Register {
	pub fn read(&self, regs: &dyn Registers) -> u32 {
		match *self {
			// Only the low half carries the P-state.
			Register::Msr(msr) => regs.read_msr(msr) as u32,
			Register::Io(addr) => regs.read_port(addr.port, addr.bit_width),
		}
	}

	/// Writes `value`.
	///
	/// For MSRs only [`INTEL_MSR_RANGE`] is replaced; all other bits keep
	/// their current value.
	pub fn write(&self, regs: &dyn Registers, value: u32) {
		match *self {
			Register::Msr(msr) => {
				let old = regs.read_msr(msr);
				let new = (old & !u64::from(INTEL_MSR_RANGE)) | u64::from(value & INTEL_MSR_RANGE);
				regs.write_msr(msr, new);
			}
			Register::Io(addr) => regs.write_port(addr.port, value, addr.bit_width),
		}
	}
}

/// The access method of a core, fixed at activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessBackend {
	/// `IA32_PERF_CTL` / `IA32_PERF_STATUS`
	IntelMsr,
	SystemIo { control: IoAddr, status: IoAddr },
}

impl AccessBackend {
	/// Chooses the backend for the registers declared by the platform.
	pub fn select(perf: &PerformanceData, features: CpuFeatures) -> Result<Self, CpufreqError> {
		let control = &perf.control_register;
		let status = &perf.status_register;

		if control.space_id != status.space_id {
			debug!(
				"Control ({}) and status ({}) are in different address spaces",
				control.space_id, status.space_id
			);
			return Err(CpufreqError::UnsupportedPlatform);
		}

		match control.address_space() {
			Some(AddressSpace::SystemIo) => {
				debug!("SYSTEM IO addr space");
				Ok(AccessBackend::SystemIo {
					control: IoAddr::from_register(control)?,
					status: IoAddr::from_register(status)?,
				})
			}
			Some(AddressSpace::FixedHardware) => {
				debug!("HARDWARE addr space");
				if !features.contains(CpuFeatures::EST) {
					debug!("Fixed hardware access requires EST");
					return Err(CpufreqError::UnsupportedPlatform);
				}
				Ok(AccessBackend::IntelMsr)
			}
			_ => {
				debug!("Unknown addr space {}", control.space_id);
				Err(CpufreqError::UnsupportedPlatform)
			}
		}
	}

	pub fn is_msr(&self) -> bool {
		matches!(self, AccessBackend::IntelMsr)
	}

	pub fn control(&self) -> Register {
		match *self {
			AccessBackend::IntelMsr => Register::Msr(MSR_IA32_PERF_CTL),
			AccessBackend::SystemIo { control, .. } => Register::Io(control),
		}
	}

	pub fn status(&self) -> Register {
		match *self {
			AccessBackend::IntelMsr => Register::Msr(MSR_IA32_PERF_STATUS),
			AccessBackend::SystemIo { status, .. } => Register::Io(status),
		}
	}

	/// Translates a raw status value into a table frequency.
	pub fn extract_freq(&self, value: u32, perf: &PerformanceData, table: &FrequencyTable) -> u32 {
		match self {
			AccessBackend::IntelMsr => extract_msr(value, perf, table),
			AccessBackend::SystemIo { .. } => extract_io(value, perf, table),
		}
	}
}

/// Matches the frequency ID only, so lowered voltages still resolve.
fn extract_msr(value: u32, perf: &PerformanceData, table: &FrequencyTable) -> u32 {
	let fid = value & INTEL_MSR_FID_MASK;

	table
		.iter()
		.find(|entry| {
			perf.states
				.get(entry.index)
				.is_some_and(|state| fid == state.status as u32 & INTEL_MSR_FID_MASK)
		})
		.or_else(|| table.get(0))
		.map_or(0, |entry| entry.frequency)
}

/// Matches the whole status value against every platform state, including
/// the ones the table dropped as duplicates.
fn extract_io(value: u32, perf: &PerformanceData, table: &FrequencyTable) -> u32 {
	let Some(state) = perf
		.states
		.iter()
		.position(|state| u64::from(value) == state.status)
	else {
		return 0;
	};

	table
		.position_of_state(state)
		.and_then(|index| table.get(index))
		.map_or_else(
			|| mhz_to_khz(perf.states[state].core_frequency),
			|entry| entry.frequency,
		)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
	Read,
	Write,
}

/// A register access to be executed on a set of cores.
#[derive(Debug)]
pub struct DriverCommand<'a> {
	pub kind: CommandKind,
	pub mask: &'a CoreSet,
	pub reg: Register,
	pub val: AtomicU32,
}

impl<'a> DriverCommand<'a> {
	pub fn read(mask: &'a CoreSet, reg: Register) -> Self {
		Self {
			kind: CommandKind::Read,
			mask,
			reg,
			val: AtomicU32::new(0),
		}
	}

	pub fn write(mask: &'a CoreSet, reg: Register, val: u32) -> Self {
		Self {
			kind: CommandKind::Write,
			mask,
			reg,
			val: AtomicU32::new(val),
		}
	}

	/// Runs the access on the calling core.
	fn execute(&self, regs: &dyn Registers) {
		match self.kind {
			CommandKind::Read => self.val.store(self.reg.read(regs), Ordering::Relaxed),
			CommandKind::Write => self.reg.write(regs, self.val.load(Ordering::Relaxed)),
		}
	}

	pub fn value(&self) -> u32 {
		self.val.load(Ordering::Relaxed)
	}
}

/// Reads on one core of the mask, preferring the calling core.
pub fn drv_read(smp: &dyn CrossCall, cmd: &DriverCommand<'_>) {
	let this = smp.current_core();
	let func = |regs: &dyn Registers| cmd.execute(regs);

	if cmd.mask.contains(this) {
		smp.run_local(&func);
	} else if let Some(core) = cmd.mask.first() {
		smp.call_function_single(core, &func);
	}
}

/// Writes on every core of the mask and waits for all of them.
pub fn drv_write(smp: &dyn CrossCall, cmd: &DriverCommand<'_>) {
	let this = smp.current_core();
	let func = |regs: &dyn Registers| cmd.execute(regs);

	if cmd.mask.contains(this) {
		smp.run_local(&func);
	}

	let others = cmd.mask.without(this);
	if !others.is_empty() {
		smp.call_function_many(&others, &func);
	}
}

/// Current raw status of the cores in `mask`, or 0 if `mask` is empty.
pub fn get_cur_val(smp: &dyn CrossCall, backend: &AccessBackend, mask: &CoreSet) -> u32 {
	if mask.is_empty() {
		return 0;
	}

	let cmd = DriverCommand::read(mask, backend.status());
	drv_read(smp, &cmd);

	let val = cmd.value();
	debug!("get_cur_val = {val}");
	val
}
