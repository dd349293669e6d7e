use thiserror::Error;

/// Errors that can occur during VM execution or assembly.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum VMError {
    /// Unknown opcode encountered in bytecode.
    #[error("unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    /// Register index exceeds the register file size.
    #[error("register r{index} not found ({available} registers available)")]
    RegisterNotFound { index: u8, available: usize },
    /// Bytecode ended while an instruction still needed operand bytes.
    #[error("out of bounds: requested {requested} byte(s) at ip {ip}, {available} available")]
    OutOfBounds {
        ip: usize,
        requested: usize,
        available: usize,
    },
    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Register value cannot be used as a program position or delta.
    #[error("invalid jump target {value}")]
    InvalidJumpTarget { value: f64 },
    /// Register file capacity outside 1..=256.
    #[error("invalid register count {0}, expected 1..=256")]
    InvalidRegisterCount(usize),
    /// Unrecognized instruction mnemonic during assembly.
    #[error("invalid instruction name: {0}")]
    InvalidInstructionName(String),
    /// Wrong number of operands for an instruction.
    #[error("{instruction} expects {expected} operand(s), got {actual}")]
    ArityMismatch {
        instruction: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Expected a register operand (e.g., `r0`) but got something else.
    #[error("expected register, got {0}")]
    ExpectedRegister(String),
    /// Register index out of range or malformed.
    #[error("invalid register {0}")]
    InvalidRegister(String),
    /// Immediate that is neither a 16-bit number nor a label.
    #[error("invalid immediate {0}, expected 0..=65535 or a label")]
    InvalidImmediate(String),
    /// Label defined more than once.
    #[error("duplicate label: {0}")]
    DuplicateLabel(String),
    /// Reference to undefined label.
    #[error("undefined label: {0}")]
    UndefinedLabel(String),
    /// Assembly error with line number context.
    #[error("line {line}, column {offset}: {source}")]
    AssemblyError {
        line: usize,
        offset: usize,
        source: Box<VMError>,
    },
    /// File I/O error during assembly or loading.
    #[error("io error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for VMError {
    fn from(err: std::io::Error) -> Self {
        VMError::IoError(err.to_string())
    }
}
