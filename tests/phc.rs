mod common;

use common::*;
use cpufreq::{AcpiCpufreq, CpufreqError};
use cpufreq::arch::CpuFeatures;
use cpufreq::config::MSR_IA32_PERF_CTL;
use cpufreq::drivers::cpufreq::attr::Attribute;
use cpufreq::drivers::cpufreq::policy::{Policy, SharedType};
use cpufreq::drivers::cpufreq::table::Relation;
use cpufreq::env::Params;
use cpufreq::errno::{Errno, ToRetval};

fn default_machine() -> Machine {
	Machine::new(2, msr_platform(&DEFAULT_STATES, SharedType::All, &[0, 1]))
}

#[test]
fn paired_write_is_all_or_nothing() {
	let machine = default_machine();
	let mut driver = machine.driver(Params::default());
	let mut policy = Policy::new(0);
	driver.init(&mut policy).unwrap();

	// FID 2 exists, FID 3 does not.
	assert_eq!(
		driver.store_controls(&policy, "3:1,2:0"),
		Err(CpufreqError::InvalidInput)
	);
	assert_eq!(driver.show_controls(0).unwrap(), "8:3 6:2 4:1 \n");
	assert!(machine.cores.take_writes().is_empty());

	// An unknown FID anywhere in the batch discards the pairs before it.
	assert_eq!(
		driver.store_controls(&policy, "6:1,3:0\n"),
		Err(CpufreqError::InvalidInput)
	);
	assert_eq!(driver.show_controls(0).unwrap(), "8:3 6:2 4:1 \n");

	assert_eq!(driver.store_controls(&policy, "6:1,4:0"), Ok(7));
	assert_eq!(driver.show_controls(0).unwrap(), "8:3 6:1 4:0 \n");
	assert_eq!(driver.show_default_controls(0).unwrap(), "8:3 6:2 4:1 \n");
}

#[test]
fn voltage_never_exceeds_the_default() {
	let machine = default_machine();
	let mut driver = machine.driver(Params::default());
	let mut policy = Policy::new(0);
	driver.init(&mut policy).unwrap();

	assert_eq!(driver.store_vids(&policy, "9 9 9\n"), Ok(6));
	assert_eq!(driver.show_vids(0).unwrap(), "3 2 1 \n");

	assert_eq!(driver.store_controls(&policy, "8:4 6:0\n"), Ok(8));
	assert_eq!(driver.show_vids(0).unwrap(), "3 0 1 \n");

	// The bound is the platform default, not the current value.
	assert_eq!(driver.store_vids(&policy, "0,0,0\n"), Ok(6));
	assert_eq!(driver.store_vids(&policy, "3,2,1\n"), Ok(6));
	assert_eq!(driver.show_vids(0).unwrap(), "3 2 1 \n");
	assert_eq!(driver.show_fids(0).unwrap(), "8 6 4 \n");
}

#[test]
fn ordered_write_keeps_what_was_applied() {
	let machine = default_machine();
	let mut driver = machine.driver(Params::default());
	let mut policy = Policy::new(0);
	driver.init(&mut policy).unwrap();
	driver.target(&policy, 3_000_000, Relation::Low).unwrap();
	assert_eq!(driver.needs_resync(0), Some(false));
	machine.cores.take_writes();

	assert_eq!(
		driver.store_vids(&policy, "2 x 0\n"),
		Err(CpufreqError::InvalidInput)
	);
	assert_eq!(driver.show_vids(0).unwrap(), "2 2 1 \n");
	assert_eq!(driver.needs_resync(0), Some(true));
	assert!(machine.cores.take_writes().is_empty());

	// The next transition pushes the lowered voltage.
	driver.target(&policy, 3_000_000, Relation::Low).unwrap();
	assert_eq!(machine.cores.take_writes(), [(0, 0x0802), (1, 0x0802)]);
}

#[test]
fn store_reapplies_the_current_state() {
	let machine = default_machine();
	let mut driver = machine.driver(Params::default());
	let mut policy = Policy::new(0);
	driver.init(&mut policy).unwrap();
	driver.target(&policy, 2_600_000, Relation::Low).unwrap();
	machine.cores.take_writes();

	assert_eq!(driver.store_vids(&policy, "3 1 1\n"), Ok(6));
	assert_eq!(machine.cores.take_writes(), [(0, 0x0601), (1, 0x0601)]);
	assert_eq!(machine.cores.msr(1, MSR_IA32_PERF_CTL) & 0xffff, 0x0601);
	assert_eq!(driver.current_state(0), Some(1));
	assert_eq!(driver.get(0), 2_600_000);
}

#[test]
fn shared_fid_updates_every_state() {
	let machine = Machine::new(
		1,
		msr_platform(
			&[(3000, 0x0803), (2600, 0x0603), (2400, 0x0602)],
			SharedType::None,
			&[0],
		),
	);
	let mut driver = machine.driver(Params::default());
	let mut policy = Policy::new(0);
	driver.init(&mut policy).unwrap();

	assert_eq!(driver.store_controls(&policy, "6:2\n"), Ok(4));
	assert_eq!(driver.show_controls(0).unwrap(), "8:3 6:2 6:2 \n");
}

#[test]
fn port_backend_has_no_voltage_control() {
	let mut machine = Machine::new(
		1,
		io_platform(&DEFAULT_STATES, SharedType::None, &[0]),
	);
	machine.processor.features = CpuFeatures::empty();
	let mut driver = machine.driver(Params::default());
	let mut policy = Policy::new(0);
	driver.init(&mut policy).unwrap();

	assert_eq!(driver.show_vids(0), Err(CpufreqError::NoDevice));
	assert_eq!(driver.show_default_controls(0), Err(CpufreqError::NoDevice));
	assert_eq!(
		driver.store_vids(&policy, "1 1 1\n"),
		Err(CpufreqError::NoDevice)
	);
	assert_eq!(
		driver.show(0, Attribute::ScalingAvailableFrequencies).unwrap(),
		"3000000 2600000 2200000 \n"
	);
}

fn show(driver: &mut AcpiCpufreq<'_>, name: &str) -> String {
	driver.show(0, Attribute::from_name(name).unwrap()).unwrap()
}

#[test]
fn attributes() {
	let machine = default_machine();
	let mut driver = machine.driver(Params::default());
	let mut policy = Policy::new(0);
	driver.init(&mut policy).unwrap();

	assert_eq!(show(&mut driver, "phc_version"), "0.3.2:2\n");
	assert_eq!(show(&mut driver, "phc_default_vids"), "3 2 1 \n");
	assert_eq!(show(&mut driver, "phc_fids"), "8 6 4 \n");

	assert_eq!(driver.store(&policy, Attribute::PhcVids, "1 1 1\n"), Ok(6));
	assert_eq!(show(&mut driver, "phc_vids"), "1 1 1 \n");
	assert_eq!(
		driver.store(&policy, Attribute::PhcControls, "8:0,6:0,4:0\n"),
		Ok(12)
	);
	assert_eq!(show(&mut driver, "phc_controls"), "8:0 6:0 4:0 \n");
	assert_eq!(show(&mut driver, "phc_default_controls"), "8:3 6:2 4:1 \n");

	let read_only = driver.store(&policy, Attribute::PhcDefaultVids, "1 1 1\n");
	assert_eq!(read_only, Err(CpufreqError::InvalidInput));
	assert_eq!(read_only.to_retval(), -22);
	assert_eq!(Errno::from(CpufreqError::NoDevice), Errno::Nodev);

	assert_eq!(
		driver.show(1, Attribute::PhcVids),
		Err(CpufreqError::NoDevice)
	);
}

#[test]
fn reregistration_discards_overrides() {
	let machine = default_machine();
	let mut driver = machine.driver(Params::default());
	let mut policy = Policy::new(0);
	driver.init(&mut policy).unwrap();

	driver.store_vids(&policy, "0 0 0\n").unwrap();
	assert_eq!(driver.show_vids(0).unwrap(), "0 0 0 \n");

	driver.init(&mut policy).unwrap();
	assert_eq!(driver.show_vids(0).unwrap(), "3 2 1 \n");
	assert_eq!(driver.needs_resync(0), Some(true));
}
