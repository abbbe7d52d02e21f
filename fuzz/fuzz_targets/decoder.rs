#![no_main]

use byte_machine::disassemble;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|bytes: &[u8]| {
	let mut end = 0;
	for entry in disassemble(bytes) {
		let Ok((offset, instruction)) = entry else { break };

		assert_eq!(offset, end);
		end = offset + instruction.encoded_len();
	}
	assert!(end <= bytes.len());
});
