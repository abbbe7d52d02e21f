use core::fmt;
use core::mem::transmute;

use thiserror_no_std::Error;
use variant_count::VariantCount;

use crate::decoder::Width;
use crate::{Address, RegisterIndex, Word};

/// Opcode bytes. The discriminants are the encoding, so the order of the
/// variants must not change.
#[repr(u8)]
#[derive(VariantCount, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Op {
    Nop,
    Push,
    Pop,
    Load,
    Store,
    Jmp,
    Jz,
    Jnz,
    Add,
    Sub,
    Mul,
    Div,
    Print,
    Stop,
}

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
#[error("unknown opcode 0x{0:02x}")]
pub struct UnknownOp(pub u8);

impl Op {
    /// Width of the immediate following the opcode byte, if any.
    pub const fn immediate_width(self) -> Option<Width> {
        match self {
            Op::Push => Some(Width::Four),
            Op::Load | Op::Store => Some(Width::One),
            Op::Jmp | Op::Jz | Op::Jnz => Some(Width::Two),
            Op::Nop
            | Op::Pop
            | Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Print
            | Op::Stop => None,
        }
    }

    /// Opcode byte plus immediate.
    pub const fn encoded_len(self) -> usize {
        match self.immediate_width() {
            Some(width) => width.bytes().saturating_add(1),
            None => 1,
        }
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::Nop => "NOP",
            Op::Push => "PUSH",
            Op::Pop => "POP",
            Op::Load => "LOAD",
            Op::Store => "STORE",
            Op::Jmp => "JMP",
            Op::Jz => "JZ",
            Op::Jnz => "JNZ",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Print => "PRINT",
            Op::Stop => "STOP",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl From<Op> for u8 {
    fn from(op: Op) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for Op {
    type Error = UnknownOp;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if usize::from(value) >= Op::VARIANT_COUNT {
            return Err(UnknownOp(value));
        }

        // SAFTY: `Op` is `repr(u8)` with contiguous discriminants starting
        // at zero and we just checked that the value is in range.
        let op = unsafe { transmute::<u8, Self>(value) };
        Ok(op)
    }
}

/// A decoded instruction with its immediate.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Instruction {
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

impl Instruction {
    pub fn op(&self) -> Op {
        match self {
            Instruction::Nop => Op::Nop,
            Instruction::Push(_) => Op::Push,
            Instruction::Pop => Op::Pop,
            Instruction::Load(_) => Op::Load,
            Instruction::Store(_) => Op::Store,
            Instruction::Jmp(_) => Op::Jmp,
            Instruction::Jz(_) => Op::Jz,
            Instruction::Jnz(_) => Op::Jnz,
            Instruction::Add => Op::Add,
            Instruction::Sub => Op::Sub,
            Instruction::Mul => Op::Mul,
            Instruction::Div => Op::Div,
            Instruction::Print => Op::Print,
            Instruction::Stop => Op::Stop,
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.op().encoded_len()
    }

    /// Writes the encoding in to the front of `buffer` and returns the
    /// number of bytes written, or `None` if `buffer` is too short.
    pub fn encode(&self, buffer: &mut [u8]) -> Option<usize> {
        let len = self.encoded_len();
        let (opcode, immediate) = buffer.get_mut(..len)?.split_first_mut()?;
        *opcode = self.op().into();
        match *self {
            Instruction::Push(value) => immediate.copy_from_slice(&value.to_le_bytes()),
            Instruction::Load(index) | Instruction::Store(index) => {
                immediate.copy_from_slice(&index.to_le_bytes())
            }
            Instruction::Jmp(target) | Instruction::Jz(target) | Instruction::Jnz(target) => {
                immediate.copy_from_slice(&target.to_le_bytes())
            }
            _ => {}
        }
        Some(len)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.op().mnemonic();
        match self {
            Instruction::Push(value) => write!(f, "{mnemonic} {value}"),
            Instruction::Load(index) | Instruction::Store(index) => {
                write!(f, "{mnemonic} r{index}")
            }
            Instruction::Jmp(target) | Instruction::Jz(target) | Instruction::Jnz(target) => {
                write!(f, "{mnemonic} {target:#06x}")
            }
            _ => f.write_str(mnemonic),
        }
    }
}
