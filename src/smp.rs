//! Cross-core primitives.
//!
//! The driver never touches another core's registers itself. Every remote
//! access is expressed as a function executed on the target core through a
//! [`CrossCall`] implementation, which the host backs with IPIs (or with
//! threads in a simulation).

use core::fmt;

use smallvec::SmallVec;

use crate::arch::Registers;

/// Sequential ID of a logical CPU core.
pub type CoreId = u32;

/// Function executed on a core with access to that core's registers.
pub type CoreFn<'a> = dyn Fn(&dyn Registers) + Sync + 'a;

/// A sorted set of cores, e.g. a coordination domain.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CoreSet {
	cores: SmallVec<[CoreId; 8]>,
}

impl CoreSet {
	pub const fn new() -> Self {
		Self {
			cores: SmallVec::new_const(),
		}
	}

	/// Set containing only `core`.
	pub fn of(core: CoreId) -> Self {
		let mut set = Self::new();
		set.insert(core);
		set
	}

	pub fn insert(&mut self, core: CoreId) -> bool {
		match self.cores.binary_search(&core) {
			Ok(_) => false,
			Err(pos) => {
				self.cores.insert(pos, core);
				true
			}
		}
	}

	pub fn remove(&mut self, core: CoreId) -> bool {
		match self.cores.binary_search(&core) {
			Ok(pos) => {
				self.cores.remove(pos);
				true
			}
			Err(_) => false,
		}
	}

	pub fn contains(&self, core: CoreId) -> bool {
		self.cores.binary_search(&core).is_ok()
	}

	pub fn first(&self) -> Option<CoreId> {
		self.cores.first().copied()
	}

	pub fn is_empty(&self) -> bool {
		self.cores.is_empty()
	}

	pub fn len(&self) -> usize {
		self.cores.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = CoreId> + '_ {
		self.cores.iter().copied()
	}

	/// Copy of this set without `core`.
	pub fn without(&self, core: CoreId) -> Self {
		let mut set = self.clone();
		set.remove(core);
		set
	}
}

impl FromIterator<CoreId> for CoreSet {
	fn from_iter<I: IntoIterator<Item = CoreId>>(iter: I) -> Self {
		let mut set = Self::new();
		for core in iter {
			set.insert(core);
		}
		set
	}
}

impl fmt::Debug for CoreSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.cores.iter()).finish()
	}
}

/// Synchronous execution of functions on other cores.
///
/// All calls block until the function has completed on every targeted core.
/// Self-dispatch through the inter-processor path is not allowed: work for
/// the calling core always goes through [`CrossCall::run_local`].
pub trait CrossCall: Sync {
	/// The core the caller is running on.
	fn current_core(&self) -> CoreId;

	/// Runs `func` on the calling core with preemption disabled.
	fn run_local(&self, func: &CoreFn<'_>);

	/// Runs `func` on `core` and waits for it.
	///
	/// `core` is never the calling core.
	fn call_function_single(&self, core: CoreId, func: &CoreFn<'_>);

	/// Runs `func` on every core in `cores` and waits for all of them.
	///
	/// `cores` never contains the calling core. The order in which the
	/// cores execute `func` is unspecified.
	fn call_function_many(&self, cores: &CoreSet, func: &CoreFn<'_>);
}
