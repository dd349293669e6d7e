//! Assembly to bytecode compiler CLI.
//!
//! Reads assembly source files and compiles them to raw bytecode.
//!
//! # Usage
//! ```text
//! assembler <input.asm> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `input.asm`: Assembly source file to compile
//!
//! # Options
//! - `-o, --output <file>`: Output file path (defaults to `<input>.bin`)
//! - `-x, --hex`: Also print the bytecode as hex to stdout
//!
//! # Examples
//! ```text
//! assembler program.asm
//! assembler program.asm -o output.bin
//! assembler program.asm -x
//! ```

use arkhe::virtual_machine::assembler::{assemble_source, render_diagnostic};
use arkhe::{error, info};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    let bin_name = bin_name(&args);

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(bin_name);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut hex = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                output_path = Some(args[i].clone());
                i += 1;
            }
            "--hex" | "-x" => {
                hex = true;
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(bin_name);
                process::exit(1);
            }
        }
    }

    if !Path::new(input_path).exists() {
        error!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    let output_path = output_path.unwrap_or_else(|| {
        let p = Path::new(input_path);
        let stem = p.file_stem().unwrap_or_default().to_string_lossy();
        let parent = p.parent().unwrap_or(Path::new("."));
        parent
            .join(format!("{}.bin", stem))
            .to_string_lossy()
            .into_owned()
    });

    if let Some(parent) = Path::new(&output_path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        error!("Output directory does not exist: {}", parent.display());
        process::exit(1);
    }

    let source = match fs::read_to_string(input_path) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let bytecode = match assemble_source(&source) {
        Ok(code) => code,
        Err(e) => {
            eprint!("{}", render_diagnostic(input_path, &source, &e));
            process::exit(1);
        }
    };

    if let Err(e) = fs::write(&output_path, &bytecode) {
        error!("Failed to write output file: {}", e);
        process::exit(1);
    }

    info!(
        "Compiled {} -> {} ({} bytes)",
        input_path,
        output_path,
        bytecode.len()
    );

    if hex {
        println!("{}", to_hex(&bytecode));
    }
}

/// Space-separated uppercase hex, one byte per pair.
fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

const USAGE: &str = "\
Assembly Compiler

USAGE:
    {program} <input.asm> [OPTIONS]

ARGS:
    <input.asm>    Assembly source file to compile

OPTIONS:
    -o, --output <file>     Output file path (defaults to <input>.bin)
    -x, --hex               Print the bytecode as hex
    -h, --help              Print this help message

EXAMPLES:
    # Compile to default output name
    {program} program.asm

    # Compile with explicit output
    {program} program.asm -o output.bin
";

/// Name to show in usage text; argv may be empty.
fn bin_name(args: &[String]) -> &str {
    args.first().map_or("assembler", String::as_str)
}

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump() {
        assert_eq!(to_hex(&[0, 0, 3, 232, 0xFF]), "00 00 03 E8 FF");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn bin_name_without_argv() {
        assert_eq!(bin_name(&[]), "assembler");
        assert_eq!(bin_name(&["./assembler".to_string()]), "./assembler");
    }
}
