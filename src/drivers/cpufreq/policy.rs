//! The view of the power-management framework: policies and transition
//! notifications.

use crate::smp::{CoreId, CoreSet};

/// How the cores of a coordination domain have to be switched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SharedType {
	/// Every core switches on its own.
	#[default]
	None,
	/// The hardware coordinates the domain.
	Hw,
	/// Software has to switch all cores of the domain.
	All,
	/// Switching any core of the domain switches all of them.
	Any,
}

/// Hardware limits reported to the framework.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuInfo {
	pub min_freq: u32,
	pub max_freq: u32,
	/// In nanoseconds.
	pub transition_latency: u32,
}

/// A frequency policy as handed to the driver by the framework.
///
/// All frequencies are in kHz.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
	/// The core owning the policy.
	pub cpu: CoreId,
	/// Cores which software has to switch together with `cpu`.
	pub cpus: CoreSet,
	/// Cores which share the frequency in any way.
	pub related_cpus: CoreSet,
	pub shared_type: SharedType,
	pub min: u32,
	pub max: u32,
	pub cur: u32,
	pub cpuinfo: CpuInfo,
}

impl Policy {
	pub fn new(cpu: CoreId) -> Self {
		Self {
			cpu,
			cpus: CoreSet::of(cpu),
			related_cpus: CoreSet::of(cpu),
			shared_type: SharedType::None,
			min: 0,
			max: u32::MAX,
			cur: 0,
			cpuinfo: CpuInfo::default(),
		}
	}
}

/// Payload of a transition notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Freqs {
	pub cpu: CoreId,
	pub old: u32,
	pub new: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPhase {
	PreChange,
	PostChange,
}

/// Receiver of frequency transition notifications.
///
/// Called synchronously, once per core of the policy, before and after the
/// hardware is written.
pub trait TransitionNotifier {
	fn notify_transition(&self, freqs: &Freqs, phase: TransitionPhase);
}
