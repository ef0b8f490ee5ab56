//! Per-core text attributes exposed to the operator.

use alloc::string::String;

use super::AcpiCpufreq;
use super::policy::Policy;
use crate::drivers::error::CpufreqError;
use crate::smp::CoreId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attribute {
	ScalingAvailableFrequencies,
	PhcVersion,
	PhcVids,
	PhcDefaultVids,
	PhcFids,
	PhcControls,
	PhcDefaultControls,
}

impl Attribute {
	pub const ALL: [Attribute; 7] = [
		Attribute::ScalingAvailableFrequencies,
		Attribute::PhcVersion,
		Attribute::PhcVids,
		Attribute::PhcDefaultVids,
		Attribute::PhcFids,
		Attribute::PhcControls,
		Attribute::PhcDefaultControls,
	];

	pub fn name(self) -> &'static str {
		match self {
			Attribute::ScalingAvailableFrequencies => "scaling_available_frequencies",
			Attribute::PhcVersion => "phc_version",
			Attribute::PhcVids => "phc_vids",
			Attribute::PhcDefaultVids => "phc_default_vids",
			Attribute::PhcFids => "phc_fids",
			Attribute::PhcControls => "phc_controls",
			Attribute::PhcDefaultControls => "phc_default_controls",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|attr| attr.name() == name)
	}

	pub fn is_writable(self) -> bool {
		matches!(self, Attribute::PhcVids | Attribute::PhcControls)
	}

	/// File mode
	pub fn mode(self) -> u16 {
		if self.is_writable() { 0o644 } else { 0o444 }
	}
}

impl AcpiCpufreq<'_> {
	/// Reads `attr` of `cpu`.
	pub fn show(&mut self, cpu: CoreId, attr: Attribute) -> Result<String, CpufreqError> {
		match attr {
			Attribute::ScalingAvailableFrequencies => self
				.frequency_table(cpu)
				.map(|table| table.available_frequencies())
				.ok_or(CpufreqError::NoDevice),
			Attribute::PhcVersion => Ok(self.phc_version()),
			Attribute::PhcVids => self.show_vids(cpu),
			Attribute::PhcDefaultVids => self.show_default_vids(cpu),
			Attribute::PhcFids => self.show_fids(cpu),
			Attribute::PhcControls => self.show_controls(cpu),
			Attribute::PhcDefaultControls => self.show_default_controls(cpu),
		}
	}

	/// Writes `buf` to `attr` of the core owning `policy`.
	///
	/// Returns the number of bytes consumed.
	pub fn store(
		&mut self,
		policy: &Policy,
		attr: Attribute,
		buf: &str,
	) -> Result<usize, CpufreqError> {
		match attr {
			Attribute::PhcVids => self.store_vids(policy, buf),
			Attribute::PhcControls => self.store_controls(policy, buf),
			_ => {
				warn!("{} is read-only", attr.name());
				Err(CpufreqError::InvalidInput)
			}
		}
	}
}
