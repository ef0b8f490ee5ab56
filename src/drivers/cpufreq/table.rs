//! The per-core frequency table and the helpers the framework would
//! otherwise provide for it.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::drivers::cpufreq::perflib::PerformanceState;
use crate::drivers::cpufreq::policy::Policy;
use crate::drivers::error::CpufreqError;

/// CPU frequency selection relations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Relation {
	/// Select the lowest frequency at or above target.
	Low,
	/// Select the highest frequency below or at target.
	High,
	/// Select the closest frequency to the target.
	Close,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrequencyEntry {
	/// Index of the backing state in the platform's state list.
	pub index: usize,
	/// In kHz.
	pub frequency: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableEntry {
	Valid(FrequencyEntry),
	/// End-of-table marker.
	End,
}

/// Operating points of one core, strictly decreasing in frequency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrequencyTable {
	entries: Vec<TableEntry>,
}

impl FrequencyTable {
	/// Builds the table from the platform's state list.
	///
	/// A state is taken only if it is strictly slower than the last state
	/// taken. This drops duplicated frequencies as well as states that break
	/// the descending order.
	pub fn build(states: &[PerformanceState]) -> Result<Self, CpufreqError> {
		let mut entries = Vec::new();
		entries
			.try_reserve_exact(states.len() + 1)
			.map_err(|_| CpufreqError::OutOfMemory)?;

		let mut last = None;
		for (index, state) in states.iter().enumerate() {
			let frequency = mhz_to_khz(state.core_frequency);
			if last.is_some_and(|last| frequency >= last) {
				continue;
			}

			entries.push(TableEntry::Valid(FrequencyEntry { index, frequency }));
			last = Some(frequency);
		}
		entries.push(TableEntry::End);

		let table = Self { entries };
		if table.len() < 2 {
			debug!("No P-States");
			return Err(CpufreqError::UnsupportedPlatform);
		}

		Ok(table)
	}

	/// The raw entries including the end marker.
	pub fn entries(&self) -> &[TableEntry] {
		&self.entries
	}

	pub fn iter(&self) -> impl Iterator<Item = &FrequencyEntry> + '_ {
		self.entries.iter().map_while(|entry| match entry {
			TableEntry::Valid(entry) => Some(entry),
			TableEntry::End => None,
		})
	}

	/// Number of valid entries.
	pub fn len(&self) -> usize {
		self.entries.len() - 1
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn get(&self, index: usize) -> Option<&FrequencyEntry> {
		match self.entries.get(index)? {
			TableEntry::Valid(entry) => Some(entry),
			TableEntry::End => None,
		}
	}

	/// Table index whose platform state is `state`.
	pub fn position_of_state(&self, state: usize) -> Option<usize> {
		self.iter().position(|entry| entry.index == state)
	}

	/// Resolves `target_freq` to a table index within the policy limits.
	pub fn target(
		&self,
		policy: &Policy,
		target_freq: u32,
		relation: Relation,
	) -> Result<usize, CpufreqError> {
		let mut optimal: Option<(usize, u32)> = None;
		let mut suboptimal: Option<(usize, u32)> = None;

		for (i, entry) in self.iter().enumerate() {
			let freq = entry.frequency;
			if freq < policy.min || freq > policy.max {
				continue;
			}

			match relation {
				Relation::High => {
					if freq <= target_freq {
						if optimal.is_none_or(|(_, best)| best <= freq) {
							optimal = Some((i, freq));
						}
					} else if suboptimal.is_none_or(|(_, best)| best >= freq) {
						suboptimal = Some((i, freq));
					}
				}
				Relation::Low => {
					if freq >= target_freq {
						if optimal.is_none_or(|(_, best)| best >= freq) {
							optimal = Some((i, freq));
						}
					} else if suboptimal.is_none_or(|(_, best)| best <= freq) {
						suboptimal = Some((i, freq));
					}
				}
				Relation::Close => {
					let distance = freq.abs_diff(target_freq);
					if optimal.is_none_or(|(_, best)| best.abs_diff(target_freq) > distance) {
						optimal = Some((i, freq));
					}
				}
			}
		}

		optimal
			.or(suboptimal)
			.map(|(i, _)| i)
			.ok_or(CpufreqError::NotSupported)
	}

	/// Sets the hardware limits of `policy` from the table.
	pub fn fill_cpuinfo(&self, policy: &mut Policy) {
		let min_freq = self.iter().map(|entry| entry.frequency).min().unwrap_or(0);
		let max_freq = self.iter().map(|entry| entry.frequency).max().unwrap_or(0);

		policy.cpuinfo.min_freq = min_freq;
		policy.cpuinfo.max_freq = max_freq;
		policy.min = min_freq;
		policy.max = max_freq;
	}

	/// Clamps the limits of `policy` to the hardware and makes sure at
	/// least one table frequency lies within them.
	pub fn verify(&self, policy: &mut Policy) -> Result<(), CpufreqError> {
		if self.is_empty() {
			return Err(CpufreqError::InvalidInput);
		}

		verify_within_cpu_limits(policy);

		let in_range = self
			.iter()
			.any(|entry| (policy.min..=policy.max).contains(&entry.frequency));
		if !in_range {
			let next_larger = self
				.iter()
				.map(|entry| entry.frequency)
				.filter(|&freq| freq > policy.max)
				.min();
			if let Some(freq) = next_larger {
				policy.max = freq;
			}
		}

		verify_within_cpu_limits(policy);
		Ok(())
	}

	/// The `scaling_available_frequencies` listing.
	pub fn available_frequencies(&self) -> String {
		let mut buf = String::new();
		for entry in self.iter() {
			write!(buf, "{} ", entry.frequency).ok();
		}
		buf.push('\n');
		buf
	}
}

fn verify_within_cpu_limits(policy: &mut Policy) {
	let (low, high) = (policy.cpuinfo.min_freq, policy.cpuinfo.max_freq);
	policy.min = policy.min.clamp(low, high);
	policy.max = policy.max.clamp(low, high);
	if policy.min > policy.max {
		policy.min = policy.max;
	}
}

pub(crate) fn mhz_to_khz(mhz: u64) -> u32 {
	u32::try_from(mhz.saturating_mul(1000)).unwrap_or(u32::MAX)
}
