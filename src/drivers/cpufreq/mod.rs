//! ACPI processor P-state driver with the PHC voltage interface.
//!
//! [`AcpiCpufreq`] owns the runtime state of every core it manages. The
//! power-management framework calls into it with a [`Policy`] and is
//! expected to serialize calls for overlapping coordination domains.

pub mod access;
pub mod attr;
pub mod perflib;
mod phc;
pub mod policy;
pub mod table;

use ahash::RandomState;
use alloc::boxed::Box;
use alloc::vec::Vec;
use bitflags::bitflags;
use hashbrown::HashMap;

use self::access::{AccessBackend, DriverCommand, drv_write, get_cur_val};
use self::perflib::{PerformanceData, PerformanceSource};
use self::policy::{Freqs, Policy, SharedType, TransitionNotifier, TransitionPhase};
use self::table::{FrequencyTable, Relation, mhz_to_khz};
use crate::arch::{CpuFeatures, Processor};
use crate::config::{
	MAX_FFH_TRANSITION_LATENCY_NS, PHC_VERSION_STRING, STRICT_POLL_ATTEMPTS, STRICT_POLL_DELAY_US,
};
use crate::drivers::error::CpufreqError;
use crate::env::Params;
use crate::smp::{CoreId, CoreSet, CrossCall};

bitflags! {
	/// Capabilities announced to the framework.
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
	pub struct DriverFlags: u32 {
		/// Delay loops do not depend on the current frequency.
		const CONST_LOOPS = 1 << 0;
		/// The average frequency can be measured with APERF/MPERF.
		const MEASURED_PERF = 1 << 1;
	}
}

/// Runtime state of one managed core.
#[derive(Debug)]
struct CpuData {
	perf: PerformanceData,
	freq_table: FrequencyTable,
	backend: AccessBackend,
	/// Forces the next transition even if the state does not change.
	resume: bool,
	/// Control values as delivered by the platform, indexed like
	/// `perf.states`.
	original_controls: Option<Box<[u64]>>,
}

impl CpuData {
	/// Frequency of the state the core is believed to be in.
	fn cached_freq(&self) -> u32 {
		match self.freq_table.position_of_state(self.perf.state) {
			Some(pos) => self.freq_table.get(pos).map_or(0, |entry| entry.frequency),
			None => self
				.perf
				.states
				.get(self.perf.state)
				.map_or(0, |state| mhz_to_khz(state.core_frequency)),
		}
	}

	fn extract_freq(&self, value: u32) -> u32 {
		self.backend
			.extract_freq(value, &self.perf, &self.freq_table)
	}
}

pub struct AcpiCpufreq<'a> {
	params: Params,
	smp: &'a dyn CrossCall,
	processor: &'a dyn Processor,
	perflib: &'a dyn PerformanceSource,
	notifier: &'a dyn TransitionNotifier,
	cpus: HashMap<CoreId, CpuData, RandomState>,
	flags: DriverFlags,
	latency_capped: bool,
}

impl<'a> AcpiCpufreq<'a> {
	pub fn new(
		params: Params,
		smp: &'a dyn CrossCall,
		processor: &'a dyn Processor,
		perflib: &'a dyn PerformanceSource,
		notifier: &'a dyn TransitionNotifier,
	) -> Self {
		Self {
			params,
			smp,
			processor,
			perflib,
			notifier,
			cpus: HashMap::with_hasher(RandomState::with_seeds(0, 0, 0, 0)),
			flags: DriverFlags::empty(),
			latency_capped: false,
		}
	}

	pub fn pstate_strict(&self) -> bool {
		self.params.pstate_strict
	}

	/// Enables or disables verification of every transition.
	pub fn set_pstate_strict(&mut self, strict: bool) {
		self.params.pstate_strict = strict;
	}

	pub fn flags(&self) -> DriverFlags {
		self.flags
	}

	pub fn is_active(&self, cpu: CoreId) -> bool {
		self.cpus.contains_key(&cpu)
	}

	/// Index of the platform state `cpu` is believed to be in.
	pub fn current_state(&self, cpu: CoreId) -> Option<usize> {
		self.cpus.get(&cpu).map(|data| data.perf.state)
	}

	pub fn needs_resync(&self, cpu: CoreId) -> Option<bool> {
		self.cpus.get(&cpu).map(|data| data.resume)
	}

	pub fn frequency_table(&self, cpu: CoreId) -> Option<&FrequencyTable> {
		self.cpus.get(&cpu).map(|data| &data.freq_table)
	}

	pub fn performance(&self, cpu: CoreId) -> Option<&PerformanceData> {
		self.cpus.get(&cpu).map(|data| &data.perf)
	}

	pub fn access_backend(&self, cpu: CoreId) -> Option<AccessBackend> {
		self.cpus.get(&cpu).map(|data| data.backend)
	}

	/// Brings `policy.cpu` under control of the driver.
	///
	/// An already managed core is set up from scratch; its table, access
	/// method and voltage backup are discarded.
	pub fn init(&mut self, policy: &mut Policy) -> Result<(), CpufreqError> {
		let cpu = policy.cpu;
		debug!("acpi_cpufreq_cpu_init");

		if self.cpus.remove(&cpu).is_some() {
			debug!("CPU{cpu} re-registered, dropping previous state");
			self.perflib.unregister_performance(cpu);
		}

		let perf = self.perflib.register_performance(cpu)?;
		let data = match self.setup(policy, perf) {
			Ok(data) => data,
			Err(err) => {
				self.perflib.unregister_performance(cpu);
				return Err(err);
			}
		};

		// notify BIOS that we exist
		self.perflib.notify_smm();

		debug!("CPU{cpu} - ACPI performance management activated.");
		for (i, state) in data.perf.states.iter().enumerate() {
			debug!(
				"     {}P{i}: {} MHz, {} mW, {} uS",
				if i == data.perf.state { '*' } else { ' ' },
				state.core_frequency,
				state.power,
				state.transition_latency
			);
		}

		self.cpus.insert(cpu, data);
		Ok(())
	}

	fn setup(
		&mut self,
		policy: &mut Policy,
		mut perf: PerformanceData,
	) -> Result<CpuData, CpufreqError> {
		let cpu = policy.cpu;

		policy.shared_type = perf.shared_type;
		// software coordination: the policy covers the whole domain
		if matches!(policy.shared_type, SharedType::All | SharedType::Any) {
			policy.cpus = perf.shared_cpu_map.clone();
		}
		policy.related_cpus = perf.shared_cpu_map.clone();

		// capability check
		if perf.state_count() <= 1 {
			debug!("No P-States");
			return Err(CpufreqError::UnsupportedPlatform);
		}

		let features = self.processor.features(cpu);
		let backend = AccessBackend::select(&perf, features)?;
		let freq_table = FrequencyTable::build(&perf.states)?;

		// detect transition latency
		let latency_us = perf
			.states
			.iter()
			.map(|state| state.transition_latency)
			.max()
			.unwrap_or(0);
		let mut latency = u32::try_from(latency_us.saturating_mul(1000)).unwrap_or(u32::MAX);
		if backend.is_msr() && latency > MAX_FFH_TRANSITION_LATENCY_NS {
			if !self.latency_capped {
				info!("P-state transition latency capped at 20 uS");
				self.latency_capped = true;
			}
			latency = MAX_FFH_TRANSITION_LATENCY_NS;
		}
		policy.cpuinfo.transition_latency = latency;

		freq_table.fill_cpuinfo(policy);
		perf.state = 0;

		// check for broken firmware
		if mhz_to_khz(perf.states[0].core_frequency) != policy.cpuinfo.max_freq {
			warn!("P-state 0 is not max freq");
		}

		let mut data = CpuData {
			perf,
			freq_table,
			backend,
			// The platform state is a guess until the first write.
			resume: true,
			original_controls: None,
		};

		policy.cur = match backend {
			AccessBackend::SystemIo { .. } => self.guess_freq(&mut data.perf),
			AccessBackend::IntelMsr => {
				data.extract_freq(get_cur_val(self.smp, &backend, &CoreSet::of(cpu)))
			}
		};

		if features.contains(CpuFeatures::CONSTANT_TSC) {
			self.flags |= DriverFlags::CONST_LOOPS;
		}
		if features.contains(CpuFeatures::APERFMPERF) {
			self.flags |= DriverFlags::MEASURED_PERF;
		}

		Ok(data)
	}

	/// Guesses the current frequency from the measured processor speed.
	///
	/// The port interface has no reliable way to read the current state.
	fn guess_freq(&self, perf: &mut PerformanceData) -> u32 {
		let Some(cpu_khz) = self.processor.cpu_khz() else {
			// assume CPU is at P0...
			perf.state = 0;
			return mhz_to_khz(perf.states[0].core_frequency);
		};

		// search the closest match to cpu_khz
		let cpu_khz = u64::from(cpu_khz);
		let mut freqn = u64::from(mhz_to_khz(perf.states[0].core_frequency));
		for i in 0..perf.state_count() - 1 {
			let freq = freqn;
			freqn = u64::from(mhz_to_khz(perf.states[i + 1].core_frequency));
			if 2 * cpu_khz > freqn + freq {
				perf.state = i;
				return u32::try_from(freq).unwrap_or(u32::MAX);
			}
		}

		perf.state = perf.state_count() - 1;
		u32::try_from(freqn).unwrap_or(u32::MAX)
	}

	/// Releases `cpu`.
	pub fn exit(&mut self, cpu: CoreId) -> Result<(), CpufreqError> {
		debug!("acpi_cpufreq_cpu_exit");

		self.cpus.remove(&cpu).ok_or(CpufreqError::NoDevice)?;
		self.perflib.unregister_performance(cpu);
		Ok(())
	}

	/// Clamps the limits of `policy` to what the core supports.
	pub fn verify(&self, policy: &mut Policy) -> Result<(), CpufreqError> {
		debug!("acpi_cpufreq_verify");

		let data = self.cpus.get(&policy.cpu).ok_or(CpufreqError::NoDevice)?;
		data.freq_table.verify(policy)
	}

	/// Marks `cpu` for an unconditional write on the next transition.
	pub fn resume(&mut self, cpu: CoreId) -> Result<(), CpufreqError> {
		debug!("acpi_cpufreq_resume");

		let data = self.cpus.get_mut(&cpu).ok_or(CpufreqError::NoDevice)?;
		data.resume = true;
		Ok(())
	}

	/// Frequency limit currently imposed by the firmware.
	pub fn bios_limit(&self, cpu: CoreId) -> Option<u32> {
		if !self.is_active(cpu) {
			return None;
		}
		self.perflib.bios_limit(cpu)
	}

	/// Current frequency of `cpu` as reported by the hardware, 0 if unknown.
	///
	/// A result that does not match the state the driver believes the core
	/// to be in (e.g. after the BIOS changed it behind our back) forces the
	/// next transition.
	pub fn get(&mut self, cpu: CoreId) -> u32 {
		debug!("get_cur_freq_on_cpu ({cpu})");

		let smp = self.smp;
		let Some(data) = self.cpus.get_mut(&cpu) else {
			return 0;
		};

		let cached_freq = data.cached_freq();
		let freq = data.extract_freq(get_cur_val(smp, &data.backend, &CoreSet::of(cpu)));
		if freq != cached_freq {
			// The dreaded BIOS frequency change behind our back.
			// Force set the frequency on next target call.
			data.resume = true;
		}

		debug!("cur freq = {freq}");
		freq
	}

	/// Switches the cores of `policy` to the table entry selected by
	/// `target_freq` and `relation`.
	pub fn target(
		&mut self,
		policy: &Policy,
		target_freq: u32,
		relation: Relation,
	) -> Result<(), CpufreqError> {
		debug!("acpi_cpufreq_target {target_freq} ({})", policy.cpu);

		let smp = self.smp;
		let notifier = self.notifier;
		let strict = self.params.pstate_strict;
		let data = self
			.cpus
			.get_mut(&policy.cpu)
			.ok_or(CpufreqError::NoDevice)?;

		let next_state = data.freq_table.target(policy, target_freq, relation)?;
		let Some(&next) = data.freq_table.get(next_state) else {
			return Err(CpufreqError::NotSupported);
		};
		let next_perf_state = next.index;

		if data.perf.state == next_perf_state {
			if data.resume {
				debug!("Called after resume, resetting to P{next_perf_state}");
			} else {
				debug!("Already at target state (P{next_perf_state})");
				return Ok(());
			}
		}

		// The control value is 32 bit wide on every supported backend.
		let control = data.perf.states[next_perf_state].control as u32;
		let mask = if policy.shared_type == SharedType::Any {
			CoreSet::of(policy.cpu)
		} else {
			policy.cpus.clone()
		};

		let old = mhz_to_khz(data.perf.states[data.perf.state].core_frequency);
		let new = next.frequency;

		for cpu in policy.cpus.iter() {
			notifier.notify_transition(&Freqs { cpu, old, new }, TransitionPhase::PreChange);
		}

		drv_write(smp, &DriverCommand::write(&mask, data.backend.control(), control));

		let confirmed = !strict || self.check_freqs(policy.cpu, &mask, new);
		let data = self
			.cpus
			.get_mut(&policy.cpu)
			.ok_or(CpufreqError::NoDevice)?;
		if !confirmed {
			debug!("acpi_cpufreq_target failed ({})", policy.cpu);
			// The hardware state is unknown now.
			data.resume = true;
			return Err(CpufreqError::TransitionTimeout);
		}

		for cpu in policy.cpus.iter() {
			notifier.notify_transition(&Freqs { cpu, old, new }, TransitionPhase::PostChange);
		}

		data.perf.state = next_perf_state;
		data.resume = false;
		Ok(())
	}

	/// Polls the status of `mask` until it reports `freq`.
	fn check_freqs(&self, cpu: CoreId, mask: &CoreSet, freq: u32) -> bool {
		let Some(data) = self.cpus.get(&cpu) else {
			return false;
		};

		for _ in 0..STRICT_POLL_ATTEMPTS {
			let cur_freq = data.extract_freq(get_cur_val(self.smp, &data.backend, mask));
			if cur_freq == freq {
				return true;
			}
			self.processor.udelay(STRICT_POLL_DELAY_US);
		}

		false
	}

	pub fn print_information(&self) {
		infoheader!(" CPUFREQ INFORMATION ");

		let strict = if self.params.pstate_strict { "Yes" } else { "No" };
		infoentry!("Driver", "acpi-cpufreq");
		infoentry!("PHC version", PHC_VERSION_STRING);
		infoentry!("Strict transitions", strict);
		let flags = self.flags;
		infoentry!("Flags", format!("{flags:?}"));

		let mut cpus: Vec<_> = self.cpus.iter().collect();
		cpus.sort_unstable_by_key(|(cpu, _)| **cpu);
		for (cpu, data) in cpus {
			let count = data.freq_table.len();
			let method = if data.backend.is_msr() { "MSR" } else { "I/O port" };
			let state = data.perf.state;
			infoentry!("Core", format!("{cpu}: {count} states via {method}, P{state}"));
		}

		infofooter!();
	}
}
