use std::fs;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use argh::FromArgs;
use byte_machine::output::OutputError;
use byte_machine::{
    DefaultMachine, MAX_INSTS, MachineConfig, MachineError, NREGS, Output, STACK_SIZE, Word,
    disassemble,
};
use log::{LevelFilter, debug, info};
use thiserror_no_std::Error;

mod logger;

/// Run a bytecode program on the stack/register virtual machine.
#[derive(FromArgs)]
struct Arguments {
    /// the binary program to run
    #[argh(positional)]
    program: String,

    /// operand stack capacity
    #[argh(option, default = "STACK_SIZE")]
    stack_size: usize,

    /// register bank size
    #[argh(option, default = "NREGS")]
    num_registers: usize,

    /// instruction buffer capacity in bytes
    #[argh(option, default = "MAX_INSTS")]
    max_program_bytes: usize,

    /// print a listing of the program instead of running it
    #[argh(switch, short = 'd')]
    disassemble: bool,

    /// one of `off`, `error`, `warn`, `info`, `debug`, `trace`
    #[argh(option, default = "LevelFilter::Warn")]
    log_level: LevelFilter,
}

#[derive(Error, Debug)]
enum BciError {
    #[error("error reading {path}: {reason}")]
    Read { path: String, reason: io::Error },
    #[error("{0}")]
    Machine(MachineError),
    #[error("error writing output: {0}")]
    Output(io::Error),
}

impl From<MachineError> for BciError {
    fn from(err: MachineError) -> Self {
        BciError::Machine(err)
    }
}

/// Writes each printed value as a decimal line.
struct LineOutput<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> LineOutput<W> {
    fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    /// Flushes, or returns the write error that stopped the program.
    fn finish(mut self) -> Result<(), io::Error> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush()
    }
}

impl<W: Write> Output for LineOutput<W> {
    fn print(&mut self, value: Word) -> Result<(), OutputError> {
        writeln!(self.writer, "{value}").map_err(|err| {
            self.error = Some(err);
            OutputError
        })
    }
}

fn list(program: &[u8]) -> Result<(), BciError> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for entry in disassemble(program) {
        let (offset, instruction) = entry?;
        writeln!(out, "{offset:05x}  {instruction}").map_err(BciError::Output)?;
    }
    out.flush().map_err(BciError::Output)
}

fn run(arguments: &Arguments) -> Result<(), BciError> {
    let config = MachineConfig::new(
        arguments.stack_size,
        arguments.num_registers,
        arguments.max_program_bytes,
    );
    config.validate(STACK_SIZE, NREGS, MAX_INSTS)?;

    let program = fs::read(&arguments.program).map_err(|reason| BciError::Read {
        path: arguments.program.clone(),
        reason,
    })?;
    info!("read {} bytes from {}", program.len(), arguments.program);

    if arguments.disassemble {
        return list(&program);
    }

    let mut machine = Box::new(DefaultMachine::load(config, &program)?);

    let stdout = io::stdout();
    let mut output = LineOutput::new(BufWriter::new(stdout.lock()));
    let result = machine.run(&mut output);
    // Anything printed before a fault still reaches stdout.
    let written = output.finish();

    match (result, written) {
        (Err(MachineError::OutputFailed { .. }), Err(err)) => Err(BciError::Output(err)),
        (Err(err), _) => Err(err.into()),
        (Ok(()), Err(err)) => Err(BciError::Output(err)),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn main() -> ExitCode {
    let arguments: Arguments = argh::from_env();
    if let Err(err) = logger::init(arguments.log_level) {
        eprintln!("bci: {err}");
    }

    match run(&arguments) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!("exiting after {:?}", err);
            eprintln!("bci: {err}");
            ExitCode::FAILURE
        }
    }
}
