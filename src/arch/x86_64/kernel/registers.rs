use x86_64::instructions::port::Port;
use x86_64::registers::model_specific::Msr;

use crate::arch::Registers;

/// Direct `rdmsr`/`wrmsr` and `in`/`out` on the running core.
#[derive(Debug)]
pub struct NativeRegisters {
	_private: (),
}

impl NativeRegisters {
	/// # Safety
	///
	/// The caller must run in ring 0 (or have I/O privileges and MSR access)
	/// and must only hand this to code that accesses registers which are
	/// valid on the running processor.
	pub const unsafe fn new() -> Self {
		Self { _private: () }
	}
}

impl Registers for NativeRegisters {
	fn read_msr(&self, msr: u32) -> u64 {
		unsafe { Msr::new(msr).read() }
	}

	fn write_msr(&self, msr: u32, value: u64) {
		let mut msr = Msr::new(msr);
		unsafe {
			msr.write(value);
		}
	}

	fn read_port(&self, port: u16, bit_width: u8) -> u32 {
		match bit_width {
			8 => u32::from(unsafe { Port::<u8>::new(port).read() }),
			16 => u32::from(unsafe { Port::<u16>::new(port).read() }),
			32 => unsafe { Port::<u32>::new(port).read() },
			_ => {
				warn!("Unsupported port width {bit_width} at {port:#x}");
				0
			}
		}
	}

	fn write_port(&self, port: u16, value: u32, bit_width: u8) {
		match bit_width {
			8 => unsafe { Port::<u8>::new(port).write(value as u8) },
			16 => unsafe { Port::<u16>::new(port).write(value as u16) },
			32 => unsafe { Port::<u32>::new(port).write(value) },
			_ => warn!("Unsupported port width {bit_width} at {port:#x}"),
		}
	}
}
