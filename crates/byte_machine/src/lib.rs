#![no_std]

#![cfg_attr(
    not(test),
    deny(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing,
        clippy::string_slice,
        clippy::arithmetic_side_effects,
        clippy::panicking_unwrap,
        clippy::out_of_bounds_indexing,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
    )
)]
#![cfg_attr(not(test), warn(clippy::missing_panics_doc))]

//! A small register/stack bytecode machine.
//!
//! A program is a flat little-endian byte stream: one opcode byte followed
//! by a fixed-width immediate for the opcodes that carry one. The machine
//! keeps an operand stack of [`Word`]s, a bank of [`Word`] registers and an
//! instruction pointer in to the byte stream. Every access is bounds
//! checked and every violation is reported as a [`MachineError`]; nothing
//! in this crate terminates the process, that decision belongs to the
//! caller.
//!
//! The resource limits are both compile time capacities (the const
//! generics of [`Machine`]) and a runtime [`MachineConfig`] which must fit
//! inside them.

use thiserror_no_std::Error;

pub mod builder;
pub mod config;
pub mod decoder;
pub mod isa;
pub mod machine;
pub mod output;

pub use config::MachineConfig;
pub use decoder::{Decoder, Disassembly, Width, disassemble};
pub use isa::{Instruction, Op};
pub use machine::{Machine, Status};
pub use output::Output;

/// Value held on the stack and in registers.
pub type Word = i32;
/// Register operand, one byte in the instruction stream.
pub type RegisterIndex = u8;
/// Jump target operand, two bytes in the instruction stream.
pub type Address = u16;

pub const STACK_SIZE: usize = 256;
pub const NREGS: usize = 16;
pub const MAX_INSTS: usize = 65536;

/// Machine sized with the default capacities.
pub type DefaultMachine = Machine<STACK_SIZE, NREGS, MAX_INSTS>;

/// Coarse classification of [`MachineError`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    ResourceExhausted,
    ResourceUnderflow,
    InvalidRegister,
    InvalidAddress,
    InvalidOpcode,
    ProgramLoadFailure,
    ArithmeticFault,
    OutputFailure,
    Configuration,
}

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum MachineError {
    #[error("stack overflow pushing {value} at offset {offset}")]
    StackOverflow { offset: usize, value: Word },
    #[error("{op} at offset {offset} needs {needed} operand(s) on the stack, found {found}")]
    StackUnderflow {
        op: Op,
        offset: usize,
        needed: usize,
        found: usize,
    },
    #[error("invalid register index {index} at offset {offset}")]
    InvalidRegister { offset: usize, index: RegisterIndex },
    #[error("invalid instruction index {target} at offset {offset}")]
    InvalidAddress { offset: usize, target: Address },
    #[error("instruction pointer {0} is outside the instruction buffer")]
    InstructionPointerOutOfBounds(usize),
    #[error("invalid instruction 0x{byte:02x} at offset {offset}")]
    InvalidOp { offset: usize, byte: u8 },
    #[error("division by zero at offset {offset}")]
    DivisionByZero { offset: usize },
    #[error("program of {size} bytes does not fit the {capacity} byte instruction buffer")]
    ProgramTooLarge { size: usize, capacity: usize },
    #[error("PRINT at offset {offset} could not write its output")]
    OutputFailed { offset: usize },
    #[error("{option} of {value} must be between 1 and {capacity}")]
    InvalidConfig {
        option: &'static str,
        value: usize,
        capacity: usize,
    },
}

impl MachineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MachineError::StackOverflow { .. } => ErrorKind::ResourceExhausted,
            MachineError::StackUnderflow { .. } => ErrorKind::ResourceUnderflow,
            MachineError::InvalidRegister { .. } => ErrorKind::InvalidRegister,
            MachineError::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            MachineError::InstructionPointerOutOfBounds(_) => ErrorKind::InvalidAddress,
            MachineError::InvalidOp { .. } => ErrorKind::InvalidOpcode,
            MachineError::DivisionByZero { .. } => ErrorKind::ArithmeticFault,
            MachineError::ProgramTooLarge { .. } => ErrorKind::ProgramLoadFailure,
            MachineError::OutputFailed { .. } => ErrorKind::OutputFailure,
            MachineError::InvalidConfig { .. } => ErrorKind::Configuration,
        }
    }
}
