//! ACPI processor P-state driver.
//!
//! The crate drives per-core operating points (frequency/voltage pairs) as
//! described by the platform's ACPI performance tables. It builds the
//! frequency table of each core, programs the hardware through either the
//! Intel performance-control MSR or a platform-described I/O port, keeps all
//! cores of a coordination domain in step, and exposes the "PHC" operator
//! interface which allows lowering the voltage ID of every operating point
//! without ever exceeding the firmware default.
//!
//! Everything that touches the machine is injected: register access
//! ([`arch::Registers`]), CPU properties ([`arch::Processor`]), cross-core
//! calls ([`smp::CrossCall`]), the ACPI performance library
//! ([`drivers::cpufreq::perflib::PerformanceSource`]) and transition
//! notifications ([`drivers::cpufreq::policy::TransitionNotifier`]).

#![warn(clippy::all)]
#![allow(clippy::identity_op)]
#![no_std]

#[macro_use]
extern crate alloc;
#[macro_use]
extern crate log;
#[cfg(test)]
extern crate std;

#[macro_use]
pub mod logging;

pub mod arch;
pub mod config;
pub mod drivers;
pub mod env;
pub mod errno;
pub mod smp;

pub use crate::drivers::cpufreq::AcpiCpufreq;
pub use crate::drivers::error::CpufreqError;
