//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the VM's instruction set. The [`for_each_instruction!`](crate::for_each_instruction) macro holds
//! the canonical instruction definitions and invokes a callback macro for code
//! generation, so the decoder, the assembler and the ISA hash check all read
//! the same table.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<u8>` for decoding opcodes
//! - Mnemonic, operand layout and width lookups
//!
//! # Bytecode Format
//!
//! Every instruction has a fixed, opcode-specific width:
//! - Opcode: 1 byte
//! - Register operand: 1 byte (register index 0-255)
//! - Immediate u16: 2 bytes (big-endian)
//! - Padding: 1 byte, read and discarded

/// Invokes a callback macro with the complete instruction definition list.
///
/// This macro enables code generation for instructions in multiple modules
/// without duplicating the instruction definitions.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Load
            // =========================
            /// LOAD rd, imm16 ; rd = imm16
            Load = 0x00, "LOAD" => [rd: Reg, imm: ImmU16],
            // =========================
            // Arithmetic
            // =========================
            /// ADD a, b, rd ; rd = a + b
            Add = 0x01, "ADD" => [a: Reg, b: Reg, rd: Reg],
            /// SUB a, b, rd ; rd = a - b
            Sub = 0x02, "SUB" => [a: Reg, b: Reg, rd: Reg],
            /// MUL a, b, rd ; rd = a * b
            Mul = 0x03, "MUL" => [a: Reg, b: Reg, rd: Reg],
            /// TRUEDIV a, b, rd ; rd = a / b (non-truncating, trap on division by zero)
            TrueDiv = 0x04, "TRUEDIV" => [a: Reg, b: Reg, rd: Reg],
            // =========================
            // Jumps
            // =========================
            /// JMP rs ; PC = rs
            Jmp = 0x05, "JMP" => [target: Reg],
            /// JMPF rs ; PC += rs
            Jmpf = 0x06, "JMPF" => [offset: Reg],
            /// JMPB rs ; PC -= rs
            Jmpb = 0x07, "JMPB" => [offset: Reg],
            // =========================
            // Comparison
            // =========================
            /// EQ a, b ; flag = (a == b)
            Eq = 0x08, "EQ" => [a: Reg, b: Reg, pad: Pad],
            /// NE a, b ; flag = (a != b)
            Ne = 0x09, "NE" => [a: Reg, b: Reg, pad: Pad],
            /// GT a, b ; flag = (a > b)
            Gt = 0x0A, "GT" => [a: Reg, b: Reg, pad: Pad],
            /// LT a, b ; flag = (a < b)
            Lt = 0x0B, "LT" => [a: Reg, b: Reg, pad: Pad],
            /// GE a, b ; flag = (a >= b)
            Ge = 0x0C, "GE" => [a: Reg, b: Reg, pad: Pad],
            /// LE a, b ; flag = (a <= b)
            Le = 0x0D, "LE" => [a: Reg, b: Reg, pad: Pad],
            // =========================
            // Conditional jumps
            // =========================
            /// JEQ rs ; if flag then PC = rs
            Jeq = 0x0E, "JEQ" => [target: Reg],
            /// JNE rs ; if !flag then PC = rs
            Jne = 0x0F, "JNE" => [target: Reg],
            // =========================
            // Misc
            // =========================
            /// NOP ; does nothing
            Nop = 0xFE, "NOP" => [],
            /// HLT ; stops the program
            Hlt = 0xFF, "HLT" => [],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        // =========================
        // VM instruction enum
        // =========================
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        /// Rejects unassigned bytes, returning the byte itself. The caller
        /// knows where it was fetched from and builds the error.
        impl TryFrom<u8> for Instruction {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(value),
                }
            }
        }

        impl Instruction {
            /// Every instruction, in table order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns the operand kinds in the order they are encoded.
            pub const fn operands(&self) -> &'static [OperandKind] {
                match self {
                    $( Instruction::$name => &[ $( OperandKind::$kind ),* ], )*
                }
            }

            /// Looks up an instruction by mnemonic (case-insensitive).
            pub fn from_mnemonic(name: &str) -> Option<Self> {
                $(
                    if name.eq_ignore_ascii_case($mnemonic) {
                        return Some(Instruction::$name);
                    }
                )*
                None
            }
        }
    };
}

/// Encoded operand kinds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperandKind {
    /// Register index, 1 byte.
    Reg,
    /// Unsigned 16-bit immediate, 2 bytes big-endian.
    ImmU16,
    /// Ignored byte keeping comparisons 4 bytes wide.
    Pad,
}

impl OperandKind {
    /// Returns the encoded byte size of this operand.
    pub const fn size(&self) -> usize {
        match self {
            OperandKind::Reg | OperandKind::Pad => 1,
            OperandKind::ImmU16 => 2,
        }
    }
}

for_each_instruction!(define_instructions);

impl Instruction {
    /// Returns the total encoded width, opcode byte included.
    pub fn width(&self) -> usize {
        1 + self.operands().iter().map(OperandKind::size).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_try_from_invalid() {
        assert_eq!(Instruction::try_from(0x10), Err(0x10));
        assert_eq!(Instruction::try_from(0xFD), Err(0xFD));
    }

    #[test]
    fn opcodes_round_trip_through_try_from() {
        for instr in Instruction::ALL {
            assert_eq!(Instruction::try_from(*instr as u8), Ok(*instr));
        }
    }

    #[test]
    fn widths() {
        assert_eq!(Instruction::Load.width(), 4);
        assert_eq!(Instruction::TrueDiv.width(), 4);
        assert_eq!(Instruction::Jmpf.width(), 2);
        assert_eq!(Instruction::Hlt.width(), 1);
        for cmp in [
            Instruction::Eq,
            Instruction::Ne,
            Instruction::Gt,
            Instruction::Lt,
            Instruction::Ge,
            Instruction::Le,
        ] {
            assert_eq!(cmp.width(), 4, "{}", cmp.mnemonic());
        }
    }

    #[test]
    fn from_mnemonic_ignores_case() {
        assert_eq!(Instruction::from_mnemonic("truediv"), Some(Instruction::TrueDiv));
        assert_eq!(Instruction::from_mnemonic("JMPB"), Some(Instruction::Jmpb));
        assert_eq!(Instruction::from_mnemonic("JPMB"), None);
    }
}
