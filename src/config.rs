/// Version of the PHC operator interface reported by `phc_version`.
pub const PHC_VERSION_STRING: &str = "0.3.2:2";

/// Number of status reads in strict mode before a transition is given up.
pub const STRICT_POLL_ATTEMPTS: usize = 100;

/// Delay between two status reads in strict mode, in microseconds.
pub const STRICT_POLL_DELAY_US: u64 = 10;

/// Upper bound for the reported transition latency of fixed-hardware
/// platforms in nanoseconds. Some BIOSes (e.g. on the T42) report far more.
pub const MAX_FFH_TRANSITION_LATENCY_NS: u32 = 20 * 1000;

/// See Intel SDM Vol. 4, Table 2-2.
pub const MSR_IA32_PERF_STATUS: u32 = 0x198;

/// See Intel SDM Vol. 4, Table 2-2.
pub const MSR_IA32_PERF_CTL: u32 = 0x199;
