//! System error numbers.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::drivers::error::CpufreqError;

/// The error numbers handed back to the power-management framework.
///
/// The values of these error numbers are the same as in Linux.
/// See [`asm-generic/errno-base.h`] for details.
///
/// [`asm-generic/errno-base.h`]: https://git.kernel.org/pub/scm/linux/kernel/git/torvalds/linux.git/tree/include/uapi/asm-generic/errno-base.h?h=v6.15
#[derive(Error, TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(i32)]
pub enum Errno {
	/// Try again
	#[doc(alias = "EAGAIN")]
	#[error("Try again")]
	Again = 11,

	/// Out of memory
	#[doc(alias = "ENOMEM")]
	#[error("Out of memory")]
	Nomem = 12,

	/// No such device
	#[doc(alias = "ENODEV")]
	#[error("No such device")]
	Nodev = 19,

	/// Invalid argument
	#[doc(alias = "EINVAL")]
	#[error("Invalid argument")]
	Inval = 22,
}

impl From<CpufreqError> for Errno {
	fn from(err: CpufreqError) -> Self {
		match err {
			CpufreqError::UnsupportedPlatform
			| CpufreqError::NotSupported
			| CpufreqError::NoDevice => Errno::Nodev,
			CpufreqError::TransitionTimeout => Errno::Again,
			CpufreqError::InvalidInput => Errno::Inval,
			CpufreqError::OutOfMemory => Errno::Nomem,
		}
	}
}

/// Conversion of driver results into the negative return values the
/// framework expects from its callbacks.
pub trait ToRetval {
	fn to_retval(self) -> isize;
}

impl ToRetval for Result<(), CpufreqError> {
	fn to_retval(self) -> isize {
		match self {
			Ok(()) => 0,
			Err(err) => -(i32::from(Errno::from(err)) as isize),
		}
	}
}

impl ToRetval for Result<usize, CpufreqError> {
	fn to_retval(self) -> isize {
		match self {
			Ok(count) => isize::try_from(count).unwrap_or(isize::MAX),
			Err(err) => -(i32::from(Errno::from(err)) as isize),
		}
	}
}
