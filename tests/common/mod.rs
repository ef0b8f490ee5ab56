//! Common code for integration tests.
//!
//! A simulated multi-core machine: every core has its own MSRs and I/O
//! ports, and cross-core calls run on scoped threads.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::thread;

use cpufreq::AcpiCpufreq;
use cpufreq::arch::{CpuFeatures, Processor, Registers};
use cpufreq::config::{MSR_IA32_PERF_CTL, MSR_IA32_PERF_STATUS};
use cpufreq::drivers::cpufreq::perflib::{
	PerformanceData, PerformanceRegister, PerformanceSource, PerformanceState,
};
use cpufreq::drivers::cpufreq::policy::{Freqs, SharedType, TransitionNotifier, TransitionPhase};
use cpufreq::drivers::error::CpufreqError;
use cpufreq::env::Params;
use cpufreq::smp::{CoreFn, CoreId, CoreSet, CrossCall};
use hermit_sync::SpinMutex;

pub const CONTROL_PORT: u16 = 0x880;
pub const STATUS_PORT: u16 = 0x882;

#[derive(Default)]
struct CoreState {
	msrs: BTreeMap<u32, u64>,
	ports: BTreeMap<u16, u32>,
}

/// The cores of the machine.
pub struct SimCores {
	cores: Vec<SpinMutex<CoreState>>,
	current: AtomicU32,
	/// Status registers ignore control writes.
	stuck: AtomicBool,
	/// `(core, value)` of every control register write.
	writes: SpinMutex<Vec<(CoreId, u32)>>,
	write_count: Arc<AtomicUsize>,
	/// Cores reached through the cross-call path.
	remote: SpinMutex<Vec<CoreId>>,
}

impl SimCores {
	fn new(count: usize, write_count: Arc<AtomicUsize>) -> Self {
		Self {
			cores: (0..count).map(|_| SpinMutex::new(CoreState::default())).collect(),
			current: AtomicU32::new(0),
			stuck: AtomicBool::new(false),
			writes: SpinMutex::new(Vec::new()),
			write_count,
			remote: SpinMutex::new(Vec::new()),
		}
	}

	pub fn set_current(&self, core: CoreId) {
		self.current.store(core, Ordering::Relaxed);
	}

	pub fn set_stuck(&self, stuck: bool) {
		self.stuck.store(stuck, Ordering::Relaxed);
	}

	pub fn msr(&self, core: CoreId, msr: u32) -> u64 {
		self.cores[core as usize]
			.lock()
			.msrs
			.get(&msr)
			.copied()
			.unwrap_or(0)
	}

	/// Changes a register behind the driver's back.
	pub fn set_msr(&self, core: CoreId, msr: u32, value: u64) {
		self.cores[core as usize].lock().msrs.insert(msr, value);
	}

	pub fn port(&self, core: CoreId, port: u16) -> u32 {
		self.cores[core as usize]
			.lock()
			.ports
			.get(&port)
			.copied()
			.unwrap_or(0)
	}

	pub fn set_port(&self, core: CoreId, port: u16, value: u32) {
		self.cores[core as usize].lock().ports.insert(port, value);
	}

	/// Control writes in core order, then cleared.
	pub fn take_writes(&self) -> Vec<(CoreId, u32)> {
		let mut writes = core::mem::take(&mut *self.writes.lock());
		writes.sort_unstable();
		writes
	}

	pub fn take_remote(&self) -> Vec<CoreId> {
		let mut remote = core::mem::take(&mut *self.remote.lock());
		remote.sort_unstable();
		remote
	}

	fn record_write(&self, core: CoreId, value: u32) {
		self.writes.lock().push((core, value));
		self.write_count.fetch_add(1, Ordering::SeqCst);
	}
}

/// Register access on one simulated core.
struct CoreView<'a> {
	cores: &'a SimCores,
	core: CoreId,
}

impl Registers for CoreView<'_> {
	fn read_msr(&self, msr: u32) -> u64 {
		self.cores.msr(self.core, msr)
	}

	fn write_msr(&self, msr: u32, value: u64) {
		let mut state = self.cores.cores[self.core as usize].lock();
		state.msrs.insert(msr, value);

		if msr == MSR_IA32_PERF_CTL {
			if !self.cores.stuck.load(Ordering::Relaxed) {
				let status = state.msrs.get(&MSR_IA32_PERF_STATUS).copied().unwrap_or(0);
				let status = (status & !0xffff) | (value & 0xffff);
				state.msrs.insert(MSR_IA32_PERF_STATUS, status);
			}
			drop(state);
			self.cores.record_write(self.core, value as u32);
		}
	}

	fn read_port(&self, port: u16, _bit_width: u8) -> u32 {
		self.cores.port(self.core, port)
	}

	fn write_port(&self, port: u16, value: u32, _bit_width: u8) {
		let mut state = self.cores.cores[self.core as usize].lock();
		state.ports.insert(port, value);

		if port == CONTROL_PORT {
			if !self.cores.stuck.load(Ordering::Relaxed) {
				state.ports.insert(STATUS_PORT, value);
			}
			drop(state);
			self.cores.record_write(self.core, value);
		}
	}
}

impl CrossCall for SimCores {
	fn current_core(&self) -> CoreId {
		self.current.load(Ordering::Relaxed)
	}

	fn run_local(&self, func: &CoreFn<'_>) {
		func(&CoreView {
			cores: self,
			core: self.current_core(),
		});
	}

	fn call_function_single(&self, core: CoreId, func: &CoreFn<'_>) {
		assert_ne!(core, self.current_core(), "self-dispatch");
		self.remote.lock().push(core);

		thread::scope(|s| {
			s.spawn(|| func(&CoreView { cores: self, core }));
		});
	}

	fn call_function_many(&self, cores: &CoreSet, func: &CoreFn<'_>) {
		assert!(!cores.contains(self.current_core()), "self-dispatch");
		self.remote.lock().extend(cores.iter());

		thread::scope(|s| {
			for core in cores.iter() {
				s.spawn(move || func(&CoreView { cores: self, core }));
			}
		});
	}
}

pub struct SimProcessor {
	pub features: CpuFeatures,
	pub cpu_khz: Option<u32>,
	pub delays: AtomicUsize,
}

impl Processor for SimProcessor {
	fn features(&self, _core: CoreId) -> CpuFeatures {
		self.features
	}

	fn cpu_khz(&self) -> Option<u32> {
		self.cpu_khz
	}

	fn udelay(&self, _usecs: u64) {
		self.delays.fetch_add(1, Ordering::Relaxed);
	}
}

/// Hands out the same performance description for every core.
pub struct StaticPlatform {
	data: PerformanceData,
	pub registered: SpinMutex<Vec<CoreId>>,
	pub unregistered: SpinMutex<Vec<CoreId>>,
	pub smm_notifications: AtomicUsize,
	pub limit: Option<u32>,
}

impl PerformanceSource for StaticPlatform {
	fn register_performance(&self, core: CoreId) -> Result<PerformanceData, CpufreqError> {
		self.registered.lock().push(core);
		Ok(self.data.clone())
	}

	fn unregister_performance(&self, core: CoreId) {
		self.unregistered.lock().push(core);
	}

	fn notify_smm(&self) {
		self.smm_notifications.fetch_add(1, Ordering::Relaxed);
	}

	fn bios_limit(&self, _core: CoreId) -> Option<u32> {
		self.limit
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
	pub phase: TransitionPhase,
	pub freqs: Freqs,
	/// Control writes performed before the notification.
	pub writes_before: usize,
}

pub struct RecordingNotifier {
	write_count: Arc<AtomicUsize>,
	events: SpinMutex<Vec<Event>>,
}

impl RecordingNotifier {
	pub fn take(&self) -> Vec<Event> {
		core::mem::take(&mut *self.events.lock())
	}
}

impl TransitionNotifier for RecordingNotifier {
	fn notify_transition(&self, freqs: &Freqs, phase: TransitionPhase) {
		self.events.lock().push(Event {
			phase,
			freqs: *freqs,
			writes_before: self.write_count.load(Ordering::SeqCst),
		});
	}
}

pub struct Machine {
	pub cores: SimCores,
	pub processor: SimProcessor,
	pub platform: StaticPlatform,
	pub notifier: RecordingNotifier,
}

impl Machine {
	pub fn new(cores: usize, data: PerformanceData) -> Self {
		let write_count = Arc::new(AtomicUsize::new(0));

		Self {
			cores: SimCores::new(cores, write_count.clone()),
			processor: SimProcessor {
				features: CpuFeatures::EST,
				cpu_khz: None,
				delays: AtomicUsize::new(0),
			},
			platform: StaticPlatform {
				data,
				registered: SpinMutex::new(Vec::new()),
				unregistered: SpinMutex::new(Vec::new()),
				smm_notifications: AtomicUsize::new(0),
				limit: None,
			},
			notifier: RecordingNotifier {
				write_count,
				events: SpinMutex::new(Vec::new()),
			},
		}
	}

	pub fn driver(&self, params: Params) -> AcpiCpufreq<'_> {
		AcpiCpufreq::new(
			params,
			&self.cores,
			&self.processor,
			&self.platform,
			&self.notifier,
		)
	}
}

/// `(MHz, control)` states reached through the performance MSRs. The status
/// values equal the control values.
pub fn msr_platform(
	states: &[(u64, u64)],
	shared_type: SharedType,
	domain: &[CoreId],
) -> PerformanceData {
	PerformanceData {
		state: 0,
		states: states
			.iter()
			.map(|&(mhz, control)| {
				let mut state = PerformanceState::new(mhz, control, control);
				state.transition_latency = 10;
				state
			})
			.collect(),
		control_register: PerformanceRegister::fixed_hardware(),
		status_register: PerformanceRegister::fixed_hardware(),
		shared_type,
		shared_cpu_map: domain.iter().copied().collect(),
	}
}

/// Like [`msr_platform`], but through [`CONTROL_PORT`] and [`STATUS_PORT`].
pub fn io_platform(
	states: &[(u64, u64)],
	shared_type: SharedType,
	domain: &[CoreId],
) -> PerformanceData {
	PerformanceData {
		control_register: PerformanceRegister::system_io(CONTROL_PORT, 16),
		status_register: PerformanceRegister::system_io(STATUS_PORT, 16),
		..msr_platform(states, shared_type, domain)
	}
}

/// 3.0, 2.6 and 2.2 GHz with the controls `8:3`, `6:2` and `4:1`.
pub const DEFAULT_STATES: [(u64, u64); 3] = [(3000, 0x0803), (2600, 0x0602), (2200, 0x0401)];
