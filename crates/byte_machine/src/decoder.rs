use crate::isa::{Instruction, Op};
use crate::{Address, MachineError, RegisterIndex, Word};

/// Immediate operand widths. Only these three exist in the encoding.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Width {
    One = 1,
    Two = 2,
    Four = 4,
}

impl Width {
    pub const fn bytes(self) -> usize {
        self as usize
    }
}

/// Reads opcodes and little-endian immediates from an instruction buffer,
/// advancing past everything it consumes.
///
/// A read either consumes all of its bytes or fails without moving the
/// position.
pub struct Decoder<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8], position: usize) -> Self {
        Self { bytes, position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], MachineError> {
        let chunk = self
            .bytes
            .get(self.position..)
            .and_then(|rest| rest.split_first_chunk::<N>());
        let Some((chunk, _)) = chunk else {
            // Report the first byte that is missing.
            let missing = self.position.max(self.bytes.len());
            return Err(MachineError::InstructionPointerOutOfBounds(missing));
        };
        self.position = self.position.saturating_add(N);
        Ok(*chunk)
    }

    /// Reads an operand of `width` bytes, least significant byte first.
    /// Four byte operands are two's complement, narrower ones come out zero
    /// extended.
    pub fn read_operand(&mut self, width: Width) -> Result<Word, MachineError> {
        match width {
            Width::One => self.take::<1>().map(|[byte]| Word::from(byte)),
            Width::Two => self.take::<2>().map(|bytes| Word::from(u16::from_le_bytes(bytes))),
            Width::Four => self.take::<4>().map(Word::from_le_bytes),
        }
    }

    pub fn read_opcode_byte(&mut self) -> Result<u8, MachineError> {
        let [byte] = self.take::<1>()?;
        Ok(byte)
    }

    fn read_register(&mut self) -> Result<RegisterIndex, MachineError> {
        self.take::<1>().map(RegisterIndex::from_le_bytes)
    }

    fn read_address(&mut self) -> Result<Address, MachineError> {
        self.take::<2>().map(Address::from_le_bytes)
    }

    /// Decodes the instruction at the current position.
    pub fn decode(&mut self) -> Result<Instruction, MachineError> {
        let offset = self.position;
        let byte = self.read_opcode_byte()?;
        let op = Op::try_from(byte).map_err(|_| MachineError::InvalidOp { offset, byte })?;
        let instruction = match op {
            Op::Nop => Instruction::Nop,
            Op::Push => Instruction::Push(self.read_operand(Width::Four)?),
            Op::Pop => Instruction::Pop,
            Op::Load => Instruction::Load(self.read_register()?),
            Op::Store => Instruction::Store(self.read_register()?),
            Op::Jmp => Instruction::Jmp(self.read_address()?),
            Op::Jz => Instruction::Jz(self.read_address()?),
            Op::Jnz => Instruction::Jnz(self.read_address()?),
            Op::Add => Instruction::Add,
            Op::Sub => Instruction::Sub,
            Op::Mul => Instruction::Mul,
            Op::Div => Instruction::Div,
            Op::Print => Instruction::Print,
            Op::Stop => Instruction::Stop,
        };
        Ok(instruction)
    }
}

/// Linear listing of a program, see [`disassemble`].
pub struct Disassembly<'a> {
    decoder: Decoder<'a>,
    failed: bool,
}

/// Walks `program` from offset zero yielding each instruction with its
/// offset. Iteration ends at the end of the bytes or after the first
/// undecodable instruction, which is yielded as an error.
pub fn disassemble(program: &[u8]) -> Disassembly<'_> {
    Disassembly {
        decoder: Decoder::new(program, 0),
        failed: false,
    }
}

impl Iterator for Disassembly<'_> {
    type Item = Result<(usize, Instruction), MachineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.decoder.position() >= self.decoder.bytes.len() {
            return None;
        }
        let offset = self.decoder.position();
        match self.decoder.decode() {
            Ok(instruction) => Some(Ok((offset, instruction))),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
