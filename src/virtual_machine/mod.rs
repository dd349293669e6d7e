//! Register-based bytecode virtual machine.
//!
//! The VM fetches an opcode byte, decodes the operands that opcode implies,
//! and mutates a fixed-size register file until `HLT` runs or the bytecode
//! is exhausted.
//!
//! # Architecture
//!
//! - **Registers**: 32 by default (up to 256) holding `f64` values, all zero at start
//! - **Instruction format**: 1-byte opcode followed by fixed, opcode-specific operands
//! - **Comparison flag**: one boolean written by `EQ`..`LE`, read by `JEQ`/`JNE`
//! - **Jumps**: `JMP`/`JEQ`/`JNE` are absolute, `JMPF`/`JMPB` are relative to
//!   the end of the jump instruction
//! - **Termination**: [`vm::Status::Halted`] on `HLT`, [`vm::Status::Exhausted`]
//!   when the instruction pointer leaves the bytecode, [`vm::Status::Faulted`]
//!   after the first execution error
//!
//! # Modules
//!
//! - [`assembler`]: Assembly parsing, diagnostics, and bytecode generation
//! - [`errors`]: Assembly and execution error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`vm`]: Core virtual machine implementation

pub mod assembler;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod vm;
