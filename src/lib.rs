//! Arkhe library.
//!
//! A small register-based bytecode virtual machine, its instruction set, and
//! an assembler for its textual form.

pub mod utils;
pub mod virtual_machine;

pub use virtual_machine::errors::VMError;
pub use virtual_machine::vm::{Status, VM};
