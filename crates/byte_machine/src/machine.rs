use heapless::Vec;
use log::{debug, trace};

use crate::config::MachineConfig;
use crate::decoder::Decoder;
use crate::isa::{Instruction, Op};
use crate::output::Output;
use crate::{Address, MachineError, RegisterIndex, Word};

/// Where the machine is in its fetch/execute cycle.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Status {
    /// The next step fetches the instruction at the instruction pointer.
    Ready,
    /// `STOP` was executed.
    Stopped,
    /// A fatal error was raised. Stepping again returns the same error.
    Faulted(MachineError),
}

/// Machine state: the instruction buffer, operand stack, registers and
/// instruction pointer.
///
/// `STACK_CAP`, `REG_CAP` and `INST_CAP` are the storage sizes. The
/// limits actually enforced come from the [`MachineConfig`], which is
/// checked against them when the machine is created.
///
/// The instruction buffer is zero filled past the loaded program, so
/// falling off the end of a program executes `NOP`s until the instruction
/// pointer leaves the buffer.
pub struct Machine<const STACK_CAP: usize, const REG_CAP: usize, const INST_CAP: usize> {
    config: MachineConfig,
    instructions: [u8; INST_CAP],
    program_len: usize,
    stack: Vec<Word, STACK_CAP>,
    registers: [Word; REG_CAP],
    instruction_pointer: usize,
    status: Status,
}

impl<const STACK_CAP: usize, const REG_CAP: usize, const INST_CAP: usize>
    Machine<STACK_CAP, REG_CAP, INST_CAP>
{
    /// Creates a machine with limits equal to its capacities and loads
    /// `program` in to it.
    pub fn new(program: &[u8]) -> Result<Self, MachineError> {
        Self::load(MachineConfig::new(STACK_CAP, REG_CAP, INST_CAP), program)
    }

    /// Creates a zeroed machine limited by `config` and copies `program`
    /// in to the start of its instruction buffer.
    ///
    /// A program larger than `config.max_program_bytes` is rejected, never
    /// truncated.
    pub fn load(config: MachineConfig, program: &[u8]) -> Result<Self, MachineError> {
        config.validate(STACK_CAP, REG_CAP, INST_CAP)?;

        let too_large = MachineError::ProgramTooLarge {
            size: program.len(),
            capacity: config.max_program_bytes,
        };
        if program.len() > config.max_program_bytes {
            return Err(too_large);
        }
        let mut instructions = [0u8; INST_CAP];
        let Some(slots) = instructions.get_mut(..program.len()) else {
            return Err(too_large);
        };
        slots.copy_from_slice(program);

        debug!(
            "loaded {} byte program (stack {}, registers {}, buffer {})",
            program.len(),
            config.stack_size,
            config.num_registers,
            config.max_program_bytes
        );

        Ok(Self {
            config,
            instructions,
            program_len: program.len(),
            stack: Vec::new(),
            registers: [0; REG_CAP],
            instruction_pointer: 0,
            status: Status::Ready,
        })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    /// Number of live stack entries.
    pub fn stack_pointer(&self) -> usize {
        self.stack.len()
    }

    /// Live stack entries, bottom first.
    pub fn stack(&self) -> &[Word] {
        self.stack.as_slice()
    }

    pub fn top(&self) -> Option<Word> {
        self.stack.last().copied()
    }

    pub fn registers(&self) -> &[Word] {
        self.registers
            .get(..self.config.num_registers)
            .unwrap_or(&self.registers)
    }

    pub fn register(&self, index: RegisterIndex) -> Option<Word> {
        self.registers().get(usize::from(index)).copied()
    }

    /// The bytes that were loaded, without the zero fill.
    pub fn program(&self) -> &[u8] {
        self.instructions.get(..self.program_len).unwrap_or(&[])
    }

    fn instruction_buffer(&self) -> &[u8] {
        self.instructions
            .get(..self.config.max_program_bytes)
            .unwrap_or(&self.instructions)
    }

    /// Runs the program from offset zero with an empty stack until `STOP`.
    ///
    /// Registers keep their values. A program that never stops and never
    /// faults never returns.
    pub fn run<O: Output>(&mut self, output: &mut O) -> Result<(), MachineError> {
        self.instruction_pointer = 0;
        self.stack.clear();
        self.status = Status::Ready;
        debug!("run: start");

        loop {
            if self.step(output)? == Status::Stopped {
                break;
            }
        }

        debug!("run: stopped at offset {}", self.instruction_pointer);
        Ok(())
    }

    /// Fetches, decodes and executes one instruction.
    pub fn step<O: Output>(&mut self, output: &mut O) -> Result<Status, MachineError> {
        match self.status {
            Status::Stopped => return Ok(Status::Stopped),
            Status::Faulted(err) => return Err(err),
            Status::Ready => {}
        }

        match self.execute_next(output) {
            Ok(status) => {
                self.status = status;
                Ok(status)
            }
            Err(err) => {
                debug!("fault: {}", err);
                self.status = Status::Faulted(err);
                Err(err)
            }
        }
    }

    fn execute_next<O: Output>(&mut self, output: &mut O) -> Result<Status, MachineError> {
        let offset = self.instruction_pointer;
        if offset >= self.config.max_program_bytes {
            return Err(MachineError::InstructionPointerOutOfBounds(offset));
        }

        let mut decoder = Decoder::new(self.instruction_buffer(), offset);
        let instruction = decoder.decode()?;
        let next = decoder.position();

        trace!("{:05}: {} (sp {})", offset, instruction, self.stack.len());
        self.execute(offset, instruction, next, output)
    }

    fn execute<O: Output>(
        &mut self,
        offset: usize,
        instruction: Instruction,
        next: usize,
        output: &mut O,
    ) -> Result<Status, MachineError> {
        let mut next = next;
        match instruction {
            Instruction::Nop => {}
            Instruction::Push(value) => self.push(offset, value)?,
            Instruction::Pop => {
                self.pop(Op::Pop, offset)?;
            }
            Instruction::Load(index) => {
                let value = self.read_register(offset, index)?;
                self.push(offset, value)?;
            }
            Instruction::Store(index) => {
                self.check_register(offset, index)?;
                let value = self.pop(Op::Store, offset)?;
                self.write_register(offset, index, value)?;
            }
            Instruction::Jmp(target) => {
                next = self.check_address(offset, target)?;
            }
            Instruction::Jz(target) => {
                let target = self.check_address(offset, target)?;
                if self.peek(Op::Jz, offset)? == 0 {
                    next = target;
                }
            }
            Instruction::Jnz(target) => {
                let target = self.check_address(offset, target)?;
                if self.peek(Op::Jnz, offset)? != 0 {
                    next = target;
                }
            }
            Instruction::Add => self.binary(Op::Add, offset, |lhs, rhs| Ok(lhs.wrapping_add(rhs)))?,
            Instruction::Sub => self.binary(Op::Sub, offset, |lhs, rhs| Ok(lhs.wrapping_sub(rhs)))?,
            Instruction::Mul => self.binary(Op::Mul, offset, |lhs, rhs| Ok(lhs.wrapping_mul(rhs)))?,
            Instruction::Div => self.binary(Op::Div, offset, |lhs, rhs| {
                if rhs == 0 {
                    return Err(MachineError::DivisionByZero { offset });
                }
                // Only `Word::MIN / -1` is left, which wraps.
                Ok(lhs.checked_div(rhs).unwrap_or(Word::MIN))
            })?,
            Instruction::Print => {
                let value = self.peek(Op::Print, offset)?;
                output
                    .print(value)
                    .map_err(|_| MachineError::OutputFailed { offset })?;
                self.pop(Op::Print, offset)?;
            }
            Instruction::Stop => return Ok(Status::Stopped),
        }
        self.instruction_pointer = next;
        Ok(Status::Ready)
    }

    fn underflow(&self, op: Op, offset: usize, needed: usize) -> MachineError {
        MachineError::StackUnderflow {
            op,
            offset,
            needed,
            found: self.stack.len(),
        }
    }

    fn push(&mut self, offset: usize, value: Word) -> Result<(), MachineError> {
        let overflow = MachineError::StackOverflow { offset, value };
        if self.stack.len() >= self.config.stack_size {
            return Err(overflow);
        }
        self.stack.push(value).map_err(|_| overflow)
    }

    fn pop(&mut self, op: Op, offset: usize) -> Result<Word, MachineError> {
        let err = self.underflow(op, offset, 1);
        self.stack.pop().ok_or(err)
    }

    fn peek(&self, op: Op, offset: usize) -> Result<Word, MachineError> {
        self.top().ok_or_else(|| self.underflow(op, offset, 1))
    }

    /// Replaces the second entry with `apply(second, top)` and drops the
    /// top. Nothing is modified if `apply` fails.
    fn binary<F>(&mut self, op: Op, offset: usize, apply: F) -> Result<(), MachineError>
    where
        F: FnOnce(Word, Word) -> Result<Word, MachineError>,
    {
        let [.., second, top] = self.stack.as_slice() else {
            return Err(self.underflow(op, offset, 2));
        };
        let result = apply(*second, *top)?;

        let Some(_) = self.stack.pop() else {
            return Err(self.underflow(op, offset, 2));
        };
        let Some(slot) = self.stack.last_mut() else {
            return Err(self.underflow(op, offset, 2));
        };
        *slot = result;
        Ok(())
    }

    fn check_register(&self, offset: usize, index: RegisterIndex) -> Result<usize, MachineError> {
        let slot = usize::from(index);
        if slot >= self.config.num_registers {
            return Err(MachineError::InvalidRegister { offset, index });
        }
        Ok(slot)
    }

    fn read_register(&self, offset: usize, index: RegisterIndex) -> Result<Word, MachineError> {
        let slot = self.check_register(offset, index)?;
        self.registers
            .get(slot)
            .copied()
            .ok_or(MachineError::InvalidRegister { offset, index })
    }

    fn write_register(
        &mut self,
        offset: usize,
        index: RegisterIndex,
        value: Word,
    ) -> Result<(), MachineError> {
        let slot = self.check_register(offset, index)?;
        let Some(register) = self.registers.get_mut(slot) else {
            return Err(MachineError::InvalidRegister { offset, index });
        };
        *register = value;
        Ok(())
    }

    fn check_address(&self, offset: usize, target: Address) -> Result<usize, MachineError> {
        let index = usize::from(target);
        if index >= self.config.max_program_bytes {
            return Err(MachineError::InvalidAddress { offset, target });
        }
        Ok(index)
    }
}
