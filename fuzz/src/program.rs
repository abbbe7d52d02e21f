use std::ops::Deref;

use arbitrary::{Arbitrary, Result, Unstructured};
use byte_machine::builder::ProgramBuilder;
use byte_machine::{Address, Instruction, RegisterIndex, Word};

const PROGRAM_CAP: usize = 1024;

#[derive(Arbitrary)]
enum Symbol {
	Nop,
	Push(Word),
	Pop,
	Load(RegisterIndex),
	Store(RegisterIndex),
	Jmp(Address),
	Jz(Address),
	Jnz(Address),
	Add,
	Sub,
	Mul,
	Div,
	Print,
	Stop,
}

impl From<Symbol> for Instruction {
	fn from(value: Symbol) -> Self {
		match value {
			Symbol::Nop => Instruction::Nop,
			Symbol::Push(value) => Instruction::Push(value),
			Symbol::Pop => Instruction::Pop,
			Symbol::Load(index) => Instruction::Load(index),
			Symbol::Store(index) => Instruction::Store(index),
			Symbol::Jmp(target) => Instruction::Jmp(target),
			Symbol::Jz(target) => Instruction::Jz(target),
			Symbol::Jnz(target) => Instruction::Jnz(target),
			Symbol::Add => Instruction::Add,
			Symbol::Sub => Instruction::Sub,
			Symbol::Mul => Instruction::Mul,
			Symbol::Div => Instruction::Div,
			Symbol::Print => Instruction::Print,
			Symbol::Stop => Instruction::Stop,
		}
	}
}

/// An encoded program made only of valid opcodes. Immediates are
/// arbitrary, so register indices and jump targets may still be invalid.
#[derive(Debug)]
pub struct ValidOpcodes {
	bytes: Vec<u8>,
}

impl Arbitrary<'_> for ValidOpcodes {
	fn arbitrary(u: &mut Unstructured) -> Result<Self> {
		let len = u.arbitrary_len::<Symbol>()?;
		let mut buffer = [0u8; PROGRAM_CAP];
		let mut builder = ProgramBuilder::new(&mut buffer);

		for _ in 0..len {
			let element = Symbol::arbitrary(u)?;

			if builder.emit(element.into()).is_err() {
				break;
			}
		}

		let length = builder.finish();
		Ok(Self {
			bytes: buffer[..length].to_vec(),
		})
	}
}

impl Deref for ValidOpcodes {
	type Target = [u8];

	fn deref(&self) -> &Self::Target {
		&self.bytes
	}
}
