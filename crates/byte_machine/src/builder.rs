use thiserror_no_std::Error;

use crate::isa::{Instruction, Op};
use crate::{Address, RegisterIndex, Word};

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProgramBuilderError {
    #[error("program buffer is too small")]
    BufferTooSmall,
    #[error("offset {0} can not be encoded as a jump target")]
    AddressOutOfRange(usize),
    #[error("{0} is not a jump instruction")]
    NotAJump(Op),
}

/// A jump emitted with an unknown target, see [`ProgramBuilder::jump_forward`].
#[derive(Debug)]
#[must_use]
pub struct JumpPatch {
    op: Op,
    offset: usize,
}

/// Writes encoded instructions in to a caller provided buffer.
///
/// ```
/// use byte_machine::builder::ProgramBuilder;
///
/// let mut buffer = [0u8; 16];
/// let mut builder = ProgramBuilder::new(&mut buffer);
/// builder.push(5)?;
/// builder.push(3)?;
/// builder.add()?;
/// builder.print()?;
/// builder.stop()?;
/// let length = builder.finish();
/// assert_eq!(length, 13);
/// # Ok::<(), byte_machine::builder::ProgramBuilderError>(())
/// ```
pub struct ProgramBuilder<'a> {
    buffer: &'a mut [u8],
    free: usize,
}

impl<'a> ProgramBuilder<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, free: 0 }
    }

    /// Offset the next instruction will be written at.
    pub fn here(&self) -> usize {
        self.free
    }

    /// [`Self::here`] as a jump target.
    pub fn label(&self) -> Result<Address, ProgramBuilderError> {
        to_address(self.free)
    }

    /// Appends `instruction` and returns the offset it was written at.
    pub fn emit(&mut self, instruction: Instruction) -> Result<usize, ProgramBuilderError> {
        let offset = self.free;
        let Some(free) = self.buffer.get_mut(offset..) else {
            return Err(ProgramBuilderError::BufferTooSmall);
        };
        let Some(written) = instruction.encode(free) else {
            return Err(ProgramBuilderError::BufferTooSmall);
        };
        let Some(new_free) = offset.checked_add(written) else {
            return Err(ProgramBuilderError::BufferTooSmall);
        };
        self.free = new_free;
        Ok(offset)
    }

    /// Appends a raw byte, for example one that is not a valid opcode.
    pub fn raw(&mut self, byte: u8) -> Result<usize, ProgramBuilderError> {
        let offset = self.free;
        let Some(slot) = self.buffer.get_mut(offset) else {
            return Err(ProgramBuilderError::BufferTooSmall);
        };
        *slot = byte;
        let Some(new_free) = offset.checked_add(1) else {
            return Err(ProgramBuilderError::BufferTooSmall);
        };
        self.free = new_free;
        Ok(offset)
    }

    pub fn nop(&mut self) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Nop)
    }

    pub fn push(&mut self, value: Word) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Push(value))
    }

    pub fn pop(&mut self) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Pop)
    }

    pub fn load(&mut self, index: RegisterIndex) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Load(index))
    }

    pub fn store(&mut self, index: RegisterIndex) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Store(index))
    }

    pub fn jmp(&mut self, target: Address) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Jmp(target))
    }

    pub fn jz(&mut self, target: Address) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Jz(target))
    }

    pub fn jnz(&mut self, target: Address) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Jnz(target))
    }

    pub fn add(&mut self) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Add)
    }

    pub fn sub(&mut self) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Sub)
    }

    pub fn mul(&mut self) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Mul)
    }

    pub fn div(&mut self) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Div)
    }

    pub fn print(&mut self) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Print)
    }

    pub fn stop(&mut self) -> Result<usize, ProgramBuilderError> {
        self.emit(Instruction::Stop)
    }

    /// Emits a jump whose target is filled in later with [`Self::patch`].
    pub fn jump_forward(&mut self, op: Op) -> Result<JumpPatch, ProgramBuilderError> {
        let instruction = match op {
            Op::Jmp => Instruction::Jmp(0),
            Op::Jz => Instruction::Jz(0),
            Op::Jnz => Instruction::Jnz(0),
            _ => return Err(ProgramBuilderError::NotAJump(op)),
        };
        let offset = self.emit(instruction)?;
        Ok(JumpPatch { op, offset })
    }

    /// Points a pending jump at `target`.
    pub fn patch(&mut self, patch: JumpPatch, target: Address) -> Result<(), ProgramBuilderError> {
        let instruction = match patch.op {
            Op::Jmp => Instruction::Jmp(target),
            Op::Jz => Instruction::Jz(target),
            Op::Jnz => Instruction::Jnz(target),
            op => return Err(ProgramBuilderError::NotAJump(op)),
        };
        let Some(slot) = self.buffer.get_mut(patch.offset..) else {
            return Err(ProgramBuilderError::BufferTooSmall);
        };
        instruction
            .encode(slot)
            .ok_or(ProgramBuilderError::BufferTooSmall)?;
        Ok(())
    }

    /// Points a pending jump at the next instruction to be emitted.
    pub fn patch_here(&mut self, patch: JumpPatch) -> Result<(), ProgramBuilderError> {
        let target = self.label()?;
        self.patch(patch, target)
    }

    /// Returns the length of the program written so far.
    pub fn finish(self) -> usize {
        self.free
    }
}

fn to_address(offset: usize) -> Result<Address, ProgramBuilderError> {
    Address::try_from(offset).map_err(|_| ProgramBuilderError::AddressOutOfRange(offset))
}
