use core::arch::x86_64::{_mm_lfence, _rdtsc};
use core::hint::spin_loop;

use hermit_sync::Lazy;
use raw_cpuid::{CpuId, CpuIdReaderNative};

use crate::arch::{CpuFeatures, Processor};
use crate::smp::CoreId;

/// Assumed TSC rate if CPUID does not report one. Over-estimating only
/// lengthens busy-waits.
const FALLBACK_TSC_MHZ: u64 = 5000;

#[derive(Debug)]
struct Features {
	cpu_features: CpuFeatures,
	base_mhz: Option<u16>,
	tsc_mhz: Option<u64>,
}

static FEATURES: Lazy<Features> = Lazy::new(|| {
	let cpuid = CpuId::new();
	let mut cpu_features = CpuFeatures::empty();

	if cpuid
		.get_feature_info()
		.is_some_and(|feature_info| feature_info.has_eist())
	{
		cpu_features.insert(CpuFeatures::EST);
	}
	if cpuid
		.get_advanced_power_mgmt_info()
		.is_some_and(|apm_info| apm_info.has_invariant_tsc())
	{
		cpu_features.insert(CpuFeatures::CONSTANT_TSC);
	}
	if cpuid
		.get_thermal_power_info()
		.is_some_and(|thermal_power_info| thermal_power_info.has_hw_coord_feedback())
	{
		cpu_features.insert(CpuFeatures::APERFMPERF);
	}

	Features {
		cpu_features,
		base_mhz: detect_base_frequency(&cpuid),
		tsc_mhz: cpuid
			.get_tsc_info()
			.and_then(|tsc_info| tsc_info.tsc_frequency())
			.map(|hz| hz / 1_000_000)
			.filter(|&mhz| mhz > 0),
	}
});

fn detect_base_frequency(cpuid: &CpuId<CpuIdReaderNative>) -> Option<u16> {
	let mhz = cpuid
		.get_processor_frequency_info()?
		.processor_base_frequency();
	//The clock frequency must never be zero, it ends up as a divisor
	(mhz > 0).then_some(mhz)
}

fn get_timestamp() -> u64 {
	unsafe {
		_mm_lfence();
		let value = _rdtsc();
		_mm_lfence();
		value
	}
}

/// The processor this code is running on, as reported by CPUID.
///
/// CPUID describes the calling core only. On x86-64 all cores of a package
/// share the features queried here, so the `core` argument is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeProcessor;

impl Processor for NativeProcessor {
	fn features(&self, _core: CoreId) -> CpuFeatures {
		FEATURES.cpu_features
	}

	fn cpu_khz(&self) -> Option<u32> {
		FEATURES.base_mhz.map(|mhz| u32::from(mhz) * 1000)
	}

	fn udelay(&self, usecs: u64) {
		let mhz = FEATURES
			.tsc_mhz
			.or_else(|| FEATURES.base_mhz.map(u64::from))
			.unwrap_or(FALLBACK_TSC_MHZ);
		let end = get_timestamp() + mhz * usecs;
		while get_timestamp() < end {
			spin_loop();
		}
	}
}
