//! Core virtual machine implementation.
//!
//! The VM fetches one opcode byte at the instruction pointer, reads the fixed
//! operand bytes that opcode implies, then updates the register file, the
//! comparison flag or the instruction pointer. Execution stops on `HLT`, when
//! the instruction pointer runs off the end of the bytecode, or on the first
//! execution error.
//!
//! Registers hold `f64` so that `TRUEDIV` can produce non-integral results.

mod registers;

pub use registers::{MAX_REGISTERS, Registers};

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;

/// Register file size used by [`VM::new`].
pub const DEFAULT_REGISTER_COUNT: usize = 32;

/// Execution state of a [`VM`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// More instructions may be executed.
    Running,
    /// `HLT` was executed.
    Halted,
    /// The instruction pointer reached or passed the end of the bytecode.
    Exhausted,
    /// An instruction failed. Every later step reports the same error.
    Faulted,
}

impl Status {
    /// Returns true once no further instruction will be executed.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Status::Running)
    }
}

/// Binary operator shared by `ADD`, `SUB`, `MUL` and `TRUEDIV`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    TrueDiv,
}

impl ArithOp {
    pub fn apply(self, a: f64, b: f64) -> Result<f64, VMError> {
        Ok(match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::TrueDiv => {
                if b == 0.0 {
                    return Err(VMError::DivisionByZero);
                }
                a / b
            }
        })
    }
}

/// Comparator shared by `EQ`, `NE`, `GT`, `LT`, `GE` and `LE`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CmpOp {
    pub fn test(self, a: f64, b: f64) -> bool {
        match self {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Gt => a > b,
            CmpOp::Lt => a < b,
            CmpOp::Ge => a >= b,
            CmpOp::Le => a <= b,
        }
    }
}

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        instr = $instr:ident,
        {
            $(
                $variant:ident => $handler:ident $( [ $op:expr ] )?
                    ( $( $field:ident : $kind:ident ),* $(,)? )
            ),* $(,)?
        }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => {
                    $( let $field = exec_vm!(@read $vm, $kind)?; )*
                    $vm.$handler( $( $op, )? $( $field ),* )
                }
            ),*
        }
    }};

    // Decode a u8 register index
    (@read $vm:ident, Reg) => {{
        $vm.next_byte()
    }};

    // Decode a u16 immediate (big-endian, 2 bytes)
    (@read $vm:ident, ImmU16) => {{
        $vm.next_word()
    }};

    // Consume the padding byte of comparison instructions
    (@read $vm:ident, Pad) => {{
        $vm.next_byte()
    }};
}

/// Bytecode virtual machine.
///
/// Owns its bytecode, instruction pointer, register file and comparison
/// flag. Instances share nothing; drive one with [`VM::step`] or
/// [`VM::run`].
pub struct VM {
    /// Bytecode to execute.
    data: Vec<u8>,
    /// Instruction pointer (current position in bytecode).
    ip: usize,
    registers: Registers,
    /// Set by comparisons, read by `JEQ` and `JNE`.
    flag: bool,
    status: Status,
    /// Error that moved the VM to [`Status::Faulted`].
    fault: Option<VMError>,
}

impl VM {
    /// Creates a new VM with [`DEFAULT_REGISTER_COUNT`] registers.
    pub fn new(program: impl Into<Vec<u8>>) -> Self {
        Self {
            data: program.into(),
            ip: 0,
            registers: Registers::default(),
            flag: false,
            status: Status::Running,
            fault: None,
        }
    }

    /// Creates a new VM with `count` registers.
    ///
    /// Returns [`VMError::InvalidRegisterCount`] unless `count` is in `1..=256`.
    pub fn with_registers(program: impl Into<Vec<u8>>, count: usize) -> Result<Self, VMError> {
        Ok(Self {
            data: program.into(),
            ip: 0,
            registers: Registers::new(count)?,
            flag: false,
            status: Status::Running,
            fault: None,
        })
    }

    /// Executes instructions until the program halts or runs out of bytecode.
    ///
    /// There is no step limit: a program that loops forever never returns.
    /// Drivers that need a bound should call [`VM::step`] themselves.
    pub fn run(&mut self) -> Result<Status, VMError> {
        loop {
            let status = self.step()?;
            if status.is_terminal() {
                return Ok(status);
            }
        }
    }

    /// Executes exactly one instruction.
    ///
    /// A VM that already halted or ran out of bytecode stays in that state and
    /// executes nothing. Any error is fatal: the VM moves to
    /// [`Status::Faulted`] and keeps returning that error.
    pub fn step(&mut self) -> Result<Status, VMError> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        if self.status.is_terminal() {
            return Ok(self.status);
        }
        if self.ip >= self.data.len() {
            self.status = Status::Exhausted;
            return Ok(self.status);
        }

        match self.fetch_and_exec() {
            Ok(()) => Ok(self.status),
            Err(err) => {
                self.status = Status::Faulted;
                self.fault = Some(err.clone());
                Err(err)
            }
        }
    }

    fn fetch_and_exec(&mut self) -> Result<(), VMError> {
        let offset = self.ip;
        let instr = Instruction::try_from(self.next_byte()?)
            .map_err(|opcode| VMError::UnknownOpcode { opcode, offset })?;
        crate::trace!("{offset:>6}: {}", instr.mnemonic());
        self.exec(instr)
    }

    pub fn read_register(&self, idx: u8) -> Result<f64, VMError> {
        self.registers.get(idx)
    }

    pub fn write_register(&mut self, idx: u8, value: f64) -> Result<(), VMError> {
        self.registers.set(idx, value)
    }

    pub fn program_counter(&self) -> usize {
        self.ip
    }

    pub fn flag(&self) -> bool {
        self.flag
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The error that faulted the VM, if any.
    pub fn fault(&self) -> Option<&VMError> {
        self.fault.as_ref()
    }

    pub fn registers(&self) -> &[f64] {
        self.registers.as_slice()
    }

    pub fn program(&self) -> &[u8] {
        &self.data
    }

    /// Reads exactly `count` bytes from the bytecode at the current IP.
    ///
    /// Advances the instruction pointer by `count` bytes.
    fn read_exact(&mut self, count: usize) -> Result<&[u8], VMError> {
        let start = self.ip;
        let available = self.data.len().saturating_sub(start);
        let out_of_bounds = VMError::OutOfBounds {
            ip: start,
            requested: count,
            available,
        };
        let end = match start.checked_add(count) {
            Some(end) => end,
            None => return Err(out_of_bounds),
        };
        let slice = self.data.get(start..end).ok_or(out_of_bounds)?;

        self.ip = end;
        Ok(slice)
    }

    fn next_byte(&mut self) -> Result<u8, VMError> {
        Ok(self.read_exact(1)?[0])
    }

    fn next_word(&mut self) -> Result<u16, VMError> {
        let bytes = self.read_exact(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Executes a single decoded instruction.
    fn exec(&mut self, instruction: Instruction) -> Result<(), VMError> {
        exec_vm! {
            vm = self,
            instr = instruction,
            {
                Load => op_load(rd: Reg, imm: ImmU16),
                // Arithmetic
                Add => op_arith[ArithOp::Add](a: Reg, b: Reg, rd: Reg),
                Sub => op_arith[ArithOp::Sub](a: Reg, b: Reg, rd: Reg),
                Mul => op_arith[ArithOp::Mul](a: Reg, b: Reg, rd: Reg),
                TrueDiv => op_arith[ArithOp::TrueDiv](a: Reg, b: Reg, rd: Reg),
                // Jumps
                Jmp => op_jmp(target: Reg),
                Jmpf => op_jmpf(offset: Reg),
                Jmpb => op_jmpb(offset: Reg),
                // Comparison
                Eq => op_compare[CmpOp::Eq](a: Reg, b: Reg, pad: Pad),
                Ne => op_compare[CmpOp::Ne](a: Reg, b: Reg, pad: Pad),
                Gt => op_compare[CmpOp::Gt](a: Reg, b: Reg, pad: Pad),
                Lt => op_compare[CmpOp::Lt](a: Reg, b: Reg, pad: Pad),
                Ge => op_compare[CmpOp::Ge](a: Reg, b: Reg, pad: Pad),
                Le => op_compare[CmpOp::Le](a: Reg, b: Reg, pad: Pad),
                // Conditional jumps
                Jeq => op_jeq(target: Reg),
                Jne => op_jne(target: Reg),
                // Misc
                Nop => op_nop(),
                Hlt => op_hlt(),
            }
        }
    }

    /// Converts a register value into a bytecode position or delta.
    fn position(value: f64) -> Result<usize, VMError> {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
            return Err(VMError::InvalidJumpTarget { value });
        }
        Ok(value as usize)
    }

    fn op_load(&mut self, dst: u8, imm: u16) -> Result<(), VMError> {
        self.registers.set(dst, f64::from(imm))
    }

    fn op_arith(&mut self, op: ArithOp, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        let va = self.registers.get(a)?;
        let vb = self.registers.get(b)?;
        self.registers.set(dst, op.apply(va, vb)?)
    }

    fn op_compare(&mut self, op: CmpOp, a: u8, b: u8, _pad: u8) -> Result<(), VMError> {
        let va = self.registers.get(a)?;
        let vb = self.registers.get(b)?;
        self.flag = op.test(va, vb);
        Ok(())
    }

    fn op_jmp(&mut self, target: u8) -> Result<(), VMError> {
        self.ip = Self::position(self.registers.get(target)?)?;
        Ok(())
    }

    /// Offsets are relative to the end of the `JMPF` instruction.
    fn op_jmpf(&mut self, offset: u8) -> Result<(), VMError> {
        let value = self.registers.get(offset)?;
        let delta = Self::position(value)?;
        self.ip = self
            .ip
            .checked_add(delta)
            .ok_or(VMError::InvalidJumpTarget { value })?;
        Ok(())
    }

    /// Offsets are relative to the end of the `JMPB` instruction.
    fn op_jmpb(&mut self, offset: u8) -> Result<(), VMError> {
        let value = self.registers.get(offset)?;
        let delta = Self::position(value)?;
        self.ip = self
            .ip
            .checked_sub(delta)
            .ok_or(VMError::InvalidJumpTarget {
                value: self.ip as f64 - value,
            })?;
        Ok(())
    }

    fn op_jeq(&mut self, target: u8) -> Result<(), VMError> {
        let value = self.registers.get(target)?;
        if self.flag {
            self.ip = Self::position(value)?;
        }
        Ok(())
    }

    fn op_jne(&mut self, target: u8) -> Result<(), VMError> {
        let value = self.registers.get(target)?;
        if !self.flag {
            self.ip = Self::position(value)?;
        }
        Ok(())
    }

    fn op_nop(&mut self) -> Result<(), VMError> {
        Ok(())
    }

    fn op_hlt(&mut self) -> Result<(), VMError> {
        self.status = Status::Halted;
        Ok(())
    }
}
