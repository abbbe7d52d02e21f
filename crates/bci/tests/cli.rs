use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

use byte_machine::Op;
use byte_machine::builder::{ProgramBuilder, ProgramBuilderError};

static NEXT_FILE: AtomicUsize = AtomicUsize::new(0);

fn assemble<F>(build: F) -> Vec<u8>
where
    F: FnOnce(&mut ProgramBuilder<'_>) -> Result<(), ProgramBuilderError>,
{
    let mut buffer = [0u8; 1024];
    let mut builder = ProgramBuilder::new(&mut buffer);
    build(&mut builder).expect("program fits the buffer");
    let length = builder.finish();
    buffer[..length].to_vec()
}

fn write_program(bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "bci-test-{}-{}.bin",
        std::process::id(),
        NEXT_FILE.fetch_add(1, Ordering::Relaxed)
    ));
    fs::write(&path, bytes).expect("write program file");
    path
}

fn bci(program: &[u8], args: &[&str]) -> Output {
    let path = write_program(program);
    let output = Command::new(env!("CARGO_BIN_EXE_bci"))
        .args(args)
        .arg(&path)
        .output()
        .expect("run bci");
    let _ = fs::remove_file(&path);
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn prints_arithmetic_results() {
    let program = assemble(|b| {
        b.push(5)?;
        b.push(3)?;
        b.add()?;
        b.print()?;
        b.push(10)?;
        b.push(4)?;
        b.sub()?;
        b.print()?;
        b.push(2)?;
        b.push(3)?;
        b.mul()?;
        b.print()?;
        b.push(9)?;
        b.push(3)?;
        b.div()?;
        b.print()?;
        b.push(-12)?;
        b.print()?;
        b.stop()?;
        Ok(())
    });
    let output = bci(&program, &[]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "8\n6\n6\n3\n-12\n");
}

#[test]
fn conditional_jump_skips_print() {
    let program = assemble(|b| {
        b.push(0)?;
        let target = b.jump_forward(Op::Jz)?;
        b.push(1)?;
        b.print()?;
        b.patch_here(target)?;
        b.push(2)?;
        b.print()?;
        b.stop()?;
        Ok(())
    });
    let output = bci(&program, &[]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "2\n");
}

#[test]
fn pop_on_empty_stack_fails() {
    let program = assemble(|b| {
        b.pop()?;
        b.stop()?;
        Ok(())
    });
    let output = bci(&program, &[]);
    assert!(!output.status.success());
    assert_eq!(stdout(&output), "");
    assert!(stderr(&output).contains("POP at offset 0 needs 1 operand(s)"));
}

#[test]
fn output_before_a_fault_is_kept() {
    let program = assemble(|b| {
        b.push(1)?;
        b.print()?;
        b.push(4)?;
        b.push(0)?;
        b.div()?;
        b.stop()?;
        Ok(())
    });
    let output = bci(&program, &[]);
    assert!(!output.status.success());
    assert_eq!(stdout(&output), "1\n");
    assert!(stderr(&output).contains("division by zero at offset 16"));
}

#[test]
fn invalid_opcode_names_byte_and_offset() {
    let program = assemble(|b| {
        b.nop()?;
        b.nop()?;
        b.raw(0x0e)?;
        Ok(())
    });
    let output = bci(&program, &[]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid instruction 0x0e at offset 2"));
}

#[test]
fn invalid_register() {
    let program = assemble(|b| {
        b.load(16)?;
        b.stop()?;
        Ok(())
    });
    let output = bci(&program, &[]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid register index 16 at offset 0"));

    let program = assemble(|b| {
        b.load(8)?;
        b.stop()?;
        Ok(())
    });
    let output = bci(&program, &[]);
    assert!(output.status.success(), "{}", stderr(&output));
    let output = bci(&program, &["--num-registers", "8"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid register index 8 at offset 0"));
}

#[test]
fn stack_size_option() {
    let program = assemble(|b| {
        b.push(1)?;
        b.push(2)?;
        b.push(3)?;
        b.stop()?;
        Ok(())
    });
    let output = bci(&program, &[]);
    assert!(output.status.success());

    let output = bci(&program, &["--stack-size", "2"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("stack overflow pushing 3 at offset 10"));
}

#[test]
fn program_larger_than_buffer_is_rejected() {
    let program = assemble(|b| {
        b.push(1)?;
        b.stop()?;
        Ok(())
    });
    let output = bci(&program, &["--max-program-bytes", "4"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("program of 6 bytes does not fit the 4 byte instruction buffer"));
}

#[test]
fn invalid_config_is_rejected() {
    let program = assemble(|b| {
        b.stop()?;
        Ok(())
    });
    let output = bci(&program, &["--stack-size", "0"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("stack_size of 0 must be between 1 and 256"));
}

#[test]
fn missing_program_file() {
    let output = Command::new(env!("CARGO_BIN_EXE_bci"))
        .arg(std::env::temp_dir().join("bci-test-does-not-exist.bin"))
        .output()
        .expect("run bci");
    assert!(!output.status.success());
    assert_eq!(stdout(&output), "");
    assert!(stderr(&output).contains("error reading"));
}

#[test]
fn directory_as_program_is_a_read_error() {
    let directory = std::env::temp_dir();
    let output = Command::new(env!("CARGO_BIN_EXE_bci"))
        .arg(&directory)
        .output()
        .expect("run bci");
    assert!(!output.status.success());
    assert_eq!(stdout(&output), "");
    assert!(stderr(&output).contains(&format!("error reading {}", directory.display())));
}

#[test]
fn disassemble_lists_instructions() {
    let program = assemble(|b| {
        b.push(7)?;
        b.store(2)?;
        b.jnz(0)?;
        b.stop()?;
        Ok(())
    });
    let output = bci(&program, &["--disassemble"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "00000  PUSH 7\n00005  STORE r2\n00007  JNZ 0x0000\n0000a  STOP\n"
    );
}
