use crate::arch::x86_64::kernel::registers::NativeRegisters;
use crate::smp::{CoreFn, CoreId, CoreSet, CrossCall};

/// Cross-core calls on a machine with a single online core.
///
/// Every coordination domain handed to the driver consists of core 0 only,
/// so all work runs locally.
#[derive(Debug)]
pub struct UniProcessor {
	registers: NativeRegisters,
}

impl UniProcessor {
	/// # Safety
	///
	/// See [`NativeRegisters::new`].
	pub const unsafe fn new() -> Self {
		Self {
			registers: unsafe { NativeRegisters::new() },
		}
	}
}

impl CrossCall for UniProcessor {
	fn current_core(&self) -> CoreId {
		0
	}

	fn run_local(&self, func: &CoreFn<'_>) {
		func(&self.registers);
	}

	fn call_function_single(&self, core: CoreId, _func: &CoreFn<'_>) {
		warn!("Core {core} is not online, dropping cross-core call");
		debug_assert!(core == 0, "cross-core call to offline core {core}");
	}

	fn call_function_many(&self, cores: &CoreSet, _func: &CoreFn<'_>) {
		if !cores.is_empty() {
			warn!("Cores {cores:?} are not online, dropping cross-core call");
		}
		debug_assert!(cores.is_empty(), "cross-core call to offline cores {cores:?}");
	}
}
