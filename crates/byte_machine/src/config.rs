use crate::{MAX_INSTS, MachineError, NREGS, STACK_SIZE};

/// Runtime resource limits of a [`crate::Machine`].
///
/// Each limit has to be at least one and no larger than the matching
/// compile time capacity of the machine it is used with.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MachineConfig {
    /// Operand stack capacity.
    pub stack_size: usize,
    /// Register bank size.
    pub num_registers: usize,
    /// Instruction buffer capacity in bytes.
    pub max_program_bytes: usize,
}

impl MachineConfig {
    pub const fn new(stack_size: usize, num_registers: usize, max_program_bytes: usize) -> Self {
        Self {
            stack_size,
            num_registers,
            max_program_bytes,
        }
    }

    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub const fn with_num_registers(mut self, num_registers: usize) -> Self {
        self.num_registers = num_registers;
        self
    }

    pub const fn with_max_program_bytes(mut self, max_program_bytes: usize) -> Self {
        self.max_program_bytes = max_program_bytes;
        self
    }

    /// Checks the limits against the capacities of a machine.
    pub fn validate(
        &self,
        stack_capacity: usize,
        register_capacity: usize,
        instruction_capacity: usize,
    ) -> Result<(), MachineError> {
        check("stack_size", self.stack_size, stack_capacity)?;
        check("num_registers", self.num_registers, register_capacity)?;
        check("max_program_bytes", self.max_program_bytes, instruction_capacity)?;
        Ok(())
    }
}

fn check(option: &'static str, value: usize, capacity: usize) -> Result<(), MachineError> {
    if value == 0 || value > capacity {
        return Err(MachineError::InvalidConfig {
            option,
            value,
            capacity,
        });
    }
    Ok(())
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::new(STACK_SIZE, NREGS, MAX_INSTS)
    }
}
