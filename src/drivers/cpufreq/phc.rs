//! PHC: operator control of the voltage IDs of every operating point.
//!
//! A control value of the Intel performance MSR packs a frequency ID (FID)
//! above a voltage ID (VID). The operator may lower the VID of any state but
//! never raise it above the value the platform delivered. The platform's
//! values are backed up on first use and serve as the upper bound from then
//! on.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use super::access::{INTEL_MSR_FID_MASK, INTEL_MSR_FID_SHIFT, INTEL_MSR_VID_MASK};
use super::perflib::PerformanceState;
use super::policy::Policy;
use super::table::Relation;
use super::{AcpiCpufreq, CpuData};
use crate::config::PHC_VERSION_STRING;
use crate::drivers::error::CpufreqError;
use crate::smp::CoreId;

fn extract_fid(control: u64) -> u32 {
	(control as u32 & INTEL_MSR_FID_MASK) >> INTEL_MSR_FID_SHIFT
}

fn extract_vid(control: u64) -> u32 {
	control as u32 & INTEL_MSR_VID_MASK
}

/// `original` with its VID replaced.
fn with_vid(original: u64, vid: u32) -> u64 {
	(original & !u64::from(INTEL_MSR_VID_MASK)) | u64::from(vid)
}

/// Parses a leading decimal number.
///
/// Returns the value and the number of bytes consumed, or `None` if `s`
/// does not start with a digit. Values beyond `u32` saturate.
fn parse_decimal(s: &str) -> Option<(u32, usize)> {
	let len = s.bytes().take_while(u8::is_ascii_digit).count();
	if len == 0 {
		return None;
	}

	let value = s[..len].parse().unwrap_or(u32::MAX);
	Some((value, len))
}

fn is_separator(b: u8) -> bool {
	matches!(b, b' ' | b'\t' | b',')
}

fn skip_separators(s: &str) -> &str {
	s.trim_start_matches([' ', '\t', ','])
}

/// Splits `fid:vid` pairs.
///
/// Pairs are separated by runs of blanks or commas; the input ends at its
/// end or at a final newline.
fn parse_controls(buf: &str) -> Result<Vec<(u32, u32)>, CpufreqError> {
	let mut pairs = Vec::new();
	let mut rest = skip_separators(buf);

	while !rest.is_empty() && rest != "\n" {
		let op = pairs.len() + 1;

		let Some((fid, len)) = parse_decimal(rest) else {
			warn!("failed to parse FID of operating point # {op} ({rest})");
			return Err(CpufreqError::InvalidInput);
		};
		rest = &rest[len..];

		let Some(after_colon) = rest.strip_prefix(':') else {
			warn!("failed to parse operating point # {op} ({rest})");
			return Err(CpufreqError::InvalidInput);
		};
		rest = after_colon;

		let Some((vid, len)) = parse_decimal(rest) else {
			warn!("failed to parse VID of operating point # {op} ({rest})");
			return Err(CpufreqError::InvalidInput);
		};
		rest = &rest[len..];

		let next = skip_separators(rest);
		if next.len() == rest.len() && !rest.is_empty() && rest != "\n" {
			warn!("missing separator after operating point # {op} ({rest})");
			return Err(CpufreqError::InvalidInput);
		}
		rest = next;

		pairs.push((fid, vid));
	}

	Ok(pairs)
}

impl CpuData {
	/// The platform's control values and the live states.
	///
	/// The control values are copied on the first call.
	fn controls_mut(&mut self) -> Result<(&[u64], &mut [PerformanceState]), CpufreqError> {
		if !self.backend.is_msr() {
			return Err(CpufreqError::NoDevice);
		}

		if self.original_controls.is_none() {
			let mut controls = Vec::new();
			controls
				.try_reserve_exact(self.perf.states.len())
				.map_err(|_| {
					warn!("failed to allocate memory for original control values");
					CpufreqError::OutOfMemory
				})?;
			controls.extend(self.perf.states.iter().map(|state| state.control));
			self.original_controls = Some(controls.into_boxed_slice());
		}

		let original = self.original_controls.as_deref().unwrap_or_default();
		Ok((original, &mut self.perf.states))
	}

	/// Formats `f` applied to the control value of every table entry.
	fn format_controls<F>(&self, controls: &[u64], f: F) -> String
	where
		F: Fn(&mut String, u64),
	{
		let mut buf = String::new();
		for entry in self.freq_table.iter() {
			if let Some(&control) = controls.get(entry.index) {
				f(&mut buf, control);
			}
		}
		buf.push('\n');
		buf
	}

	fn current_controls(&self) -> Result<Vec<u64>, CpufreqError> {
		if !self.backend.is_msr() {
			return Err(CpufreqError::NoDevice);
		}
		Ok(self.perf.states.iter().map(|state| state.control).collect())
	}
}

fn write_vid(buf: &mut String, control: u64) {
	write!(buf, "{} ", extract_vid(control)).ok();
}

fn write_fid(buf: &mut String, control: u64) {
	write!(buf, "{} ", extract_fid(control)).ok();
}

fn write_control(buf: &mut String, control: u64) {
	write!(buf, "{}:{} ", extract_fid(control), extract_vid(control)).ok();
}

impl AcpiCpufreq<'_> {
	fn phc_data(&mut self, cpu: CoreId) -> Result<&mut CpuData, CpufreqError> {
		self.cpus.get_mut(&cpu).ok_or(CpufreqError::NoDevice)
	}

	pub fn phc_version(&self) -> String {
		format!("{PHC_VERSION_STRING}\n")
	}

	/// Current VIDs in table order.
	pub fn show_vids(&mut self, cpu: CoreId) -> Result<String, CpufreqError> {
		let data = self.phc_data(cpu)?;
		let controls = data.current_controls()?;
		Ok(data.format_controls(&controls, write_vid))
	}

	/// VIDs as delivered by the platform.
	pub fn show_default_vids(&mut self, cpu: CoreId) -> Result<String, CpufreqError> {
		let data = self.phc_data(cpu)?;
		let original = data.controls_mut()?.0.to_vec();
		Ok(data.format_controls(&original, write_vid))
	}

	pub fn show_fids(&mut self, cpu: CoreId) -> Result<String, CpufreqError> {
		let data = self.phc_data(cpu)?;
		let controls = data.current_controls()?;
		Ok(data.format_controls(&controls, write_fid))
	}

	/// Current `fid:vid` pairs in table order.
	pub fn show_controls(&mut self, cpu: CoreId) -> Result<String, CpufreqError> {
		let data = self.phc_data(cpu)?;
		let controls = data.current_controls()?;
		Ok(data.format_controls(&controls, write_control))
	}

	pub fn show_default_controls(&mut self, cpu: CoreId) -> Result<String, CpufreqError> {
		let data = self.phc_data(cpu)?;
		let original = data.controls_mut()?.0.to_vec();
		Ok(data.format_controls(&original, write_control))
	}

	/// Sets the VIDs of the table entries in table order.
	///
	/// `buf` holds one decimal VID per entry, separated by runs of blanks or
	/// commas. The first VID starts at the first byte; leading blanks are not
	/// skipped. A VID above the platform's is skipped. Parsing stops at a
	/// final newline; a token which is not a number fails the call, but VIDs
	/// stored before it stay in place. Returns the number of bytes consumed.
	pub fn store_vids(&mut self, policy: &Policy, buf: &str) -> Result<usize, CpufreqError> {
		let data = self.phc_data(policy.cpu)?;
		let entries: Vec<usize> = data.freq_table.iter().map(|entry| entry.index).collect();

		let result = {
			let (original, states) = data.controls_mut()?;
			store_ordered(original, states, &entries, buf)
		};
		// Anything stored so far has to reach the hardware.
		data.resume = true;
		let consumed = result?;

		self.apply(policy)?;
		Ok(consumed)
	}

	/// Sets the VIDs of the states with the given FIDs.
	///
	/// `buf` holds decimal `fid:vid` pairs separated by runs of blanks or
	/// commas. No blanks are allowed inside a pair, so `6: 1` is malformed.
	/// Either every pair is applied or, if one of them names an unknown FID
	/// or the text is malformed, none. Returns the length of `buf`.
	pub fn store_controls(&mut self, policy: &Policy, buf: &str) -> Result<usize, CpufreqError> {
		let data = self.phc_data(policy.cpu)?;
		let (original, states) = data.controls_mut()?;

		let pairs = parse_controls(buf)?;
		let mut updates = Vec::new();
		for (op, &(fid, vid)) in pairs.iter().enumerate() {
			let mut found = false;

			for (state_index, state) in states.iter().enumerate() {
				if extract_fid(state.control) != fid {
					continue;
				}
				found = true;

				let original_control = original[state_index];
				let original_vid = extract_vid(original_control);
				if vid <= original_vid {
					updates.push((state_index, with_vid(original_control, vid)));
				} else {
					warn!(
						"skipping vid at {state_index}, {vid} is greater than default {original_vid}"
					);
				}
			}

			if !found {
				warn!("operating point # {} not found (FID = {fid})", op + 1);
				return Err(CpufreqError::InvalidInput);
			}
		}

		for (state_index, control) in updates {
			debug!(
				"setting control at {state_index} to {control:#x} (default is {:#x})",
				original[state_index]
			);
			states[state_index].control = control;
		}

		data.resume = true;
		self.apply(policy)?;
		Ok(buf.len())
	}

	/// Pushes the edited control value of the current state to the hardware.
	fn apply(&mut self, policy: &Policy) -> Result<(), CpufreqError> {
		let cur = self.get(policy.cpu);
		self.target(policy, cur, Relation::Low)
	}
}

fn store_ordered(
	original: &[u64],
	states: &mut [PerformanceState],
	entries: &[usize],
	buf: &str,
) -> Result<usize, CpufreqError> {
	let mut pos = 0;

	for (freq_index, &state_index) in entries.iter().enumerate() {
		let rest = &buf[pos..];
		let Some((vid, len)) = parse_decimal(rest) else {
			// end of line?
			if rest == "\n" {
				pos += 1;
				break;
			}
			warn!("failed to parse vid value at {freq_index} ({rest})");
			return Err(CpufreqError::InvalidInput);
		};

		let original_control = original[state_index];
		let original_vid = extract_vid(original_control);
		if vid <= original_vid {
			let control = with_vid(original_control, vid);
			debug!(
				"setting control at {freq_index} to {control:#x} (default is {original_control:#x})"
			);
			states[state_index].control = control;
		} else {
			warn!("skipping vid at {freq_index}, {vid} is greater than default {original_vid}");
		}

		pos += len;
		pos += buf[pos..].bytes().take_while(|&b| is_separator(b)).count();
	}

	if buf.get(pos..) == Some("\n") {
		pos += 1;
	}

	Ok(pos)
}
