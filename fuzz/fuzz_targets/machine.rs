#![no_main]

use byte_machine::{Machine, Status, Word};
use byte_machine_fuzz::program::ValidOpcodes;
use heapless::Vec;
use libfuzzer_sys::{fuzz_target, Corpus};

const STEP_LIMIT: usize = 10_000;

type FuzzMachine = Machine<16, 4, 1024>;

fuzz_target!(|program: ValidOpcodes| -> Corpus {
	let Ok(mut machine) = FuzzMachine::new(&program) else { return Corpus::Reject };
	let mut output = Vec::<Word, 1>::new();

	for _ in 0..STEP_LIMIT {
		let before = machine.stack_pointer();
		let result = machine.step(&mut output);

		assert!(machine.stack_pointer() <= machine.config().stack_size);
		match result {
			Ok(Status::Ready) => output.clear(),
			Ok(_) => break,
			Err(_) => {
				assert_eq!(machine.stack_pointer(), before);
				break;
			}
		}
	}

	Corpus::Keep
});
