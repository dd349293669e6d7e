//! Bytecode runner.
//!
//! Loads a program, runs it on a fresh VM and prints the registers it left
//! non-zero.
//!
//! # Usage
//! ```text
//! arkhe <program> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program`: Raw bytecode file, or assembly source if it ends in `.asm`
//!
//! # Options
//! - `-r, --registers <n>`: Register file size, 1-256 (defaults to 32)
//! - `-m, --max-steps <n>`: Stop after `n` instructions, 0 for no limit (defaults to 10000000)
//! - `-t, --trace`: Log every executed instruction
//!
//! # Environment
//! `ARKHE_LOG` selects the log threshold (`trace`, `info`, `warn`, `error`).

use arkhe::utils::log::{self, LOG_ENV_VAR, Level};
use arkhe::virtual_machine::assembler::{assemble_source, render_diagnostic};
use arkhe::virtual_machine::vm::{DEFAULT_REGISTER_COUNT, Status, VM};
use arkhe::{error, info, warn};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

const DEFAULT_MAX_STEPS: u64 = 10_000_000;

fn main() {
    let args: Vec<String> = env::args().collect();
    let bin_name = bin_name(&args);

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(bin_name);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    if let Ok(value) = env::var(LOG_ENV_VAR) {
        match value.parse::<Level>() {
            Ok(level) => log::set_level(level),
            Err(e) => warn!("Ignoring {LOG_ENV_VAR}: {e}"),
        }
    }

    let input_path = &args[1];
    let mut register_count = DEFAULT_REGISTER_COUNT;
    let mut max_steps = DEFAULT_MAX_STEPS;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--registers" | "-r") => {
                register_count = parse_value(k, args.get(i + 1));
                i += 2;
            }
            k @ ("--max-steps" | "-m") => {
                max_steps = parse_value(k, args.get(i + 1));
                i += 2;
            }
            "--trace" | "-t" => {
                log::set_level(Level::Trace);
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(bin_name);
                process::exit(1);
            }
        }
    }

    let program = load_program(input_path);
    let mut vm = match VM::with_registers(program, register_count) {
        Ok(vm) => vm,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let mut steps = 0u64;
    let status = loop {
        if max_steps != 0 && steps >= max_steps {
            error!(
                "Step limit of {max_steps} reached at ip {}",
                vm.program_counter()
            );
            print_registers(&vm);
            process::exit(1);
        }
        match vm.step() {
            Ok(Status::Running) => steps += 1,
            Ok(Status::Halted) => {
                steps += 1;
                break Status::Halted;
            }
            Ok(status) => break status,
            Err(e) => {
                error!("Execution failed after {steps} instruction(s): {e}");
                print_registers(&vm);
                process::exit(1);
            }
        }
    };

    match status {
        Status::Halted => info!("Halted after {steps} instruction(s)"),
        _ => info!("Ran off the end of the program after {steps} instruction(s)"),
    }
    print_registers(&vm);
}

/// Reads raw bytecode, assembling it first when the file is `.asm` source.
fn load_program(path: &str) -> Vec<u8> {
    if !Path::new(path).exists() {
        error!("Input file does not exist: {}", path);
        process::exit(1);
    }

    let is_source = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("asm"));

    let loaded = if is_source {
        fs::read_to_string(path).map(|source| {
            assemble_source(&source).unwrap_or_else(|e| {
                eprint!("{}", render_diagnostic(path, &source, &e));
                process::exit(1);
            })
        })
    } else {
        fs::read(path)
    };

    loaded.unwrap_or_else(|e| {
        error!("Failed to read {}: {}", path, e);
        process::exit(1);
    })
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> T {
    let Some(value) = value else {
        error!("{flag} requires an argument");
        process::exit(1);
    };
    value.parse::<T>().unwrap_or_else(|_| {
        error!("Invalid value for {flag}: '{value}'");
        process::exit(1);
    })
}

fn print_registers(vm: &VM) {
    for (idx, value) in vm.registers().iter().enumerate() {
        if *value != 0.0 {
            println!("r{idx:<3} = {value}");
        }
    }
}

/// Name to show in usage text; argv may be empty.
fn bin_name(args: &[String]) -> &str {
    args.first().map_or("arkhe", String::as_str)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <program> [OPTIONS]", program);
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <program>               Bytecode file, or assembly source ending in .asm");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -r, --registers <n>     Register file size, 1-256 (default: {DEFAULT_REGISTER_COUNT})");
    eprintln!("  -m, --max-steps <n>     Instruction limit, 0 for none (default: {DEFAULT_MAX_STEPS})");
    eprintln!("  -t, --trace             Log every executed instruction");
    eprintln!("  -h, --help              Show this help message");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {LOG_ENV_VAR}=<level>         trace, info, warn or error (default: info)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_name_without_argv() {
        assert_eq!(bin_name(&[]), "arkhe");
        assert_eq!(bin_name(&["./arkhe".to_string()]), "./arkhe");
    }
}
