//! Assembly language parser and bytecode compiler.
//!
//! Converts human-readable assembly source into bytecode for the
//! [`VM`](super::vm::VM). Operand layouts come from the ISA table, so the
//! assembler never disagrees with the decoder about instruction widths.
//!
//! # Syntax
//!
//! ```text
//! label:                       # optional, may share a line with an instruction
//! INSTRUCTION operand1, operand2, ...  # optional comment
//! ```
//!
//! - Instructions are case-insensitive (e.g., `LOAD`, `truediv`)
//! - Registers use `r` prefix (e.g., `r0`, `r31`)
//! - Immediates are decimal or `0x` hex, in `0..=65535`
//! - A label name used as an immediate becomes that label's bytecode offset
//! - Comparison padding bytes are emitted automatically
//! - Comments start with `#`
//! - Commas between operands are optional

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Instruction, OperandKind};
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';

#[derive(Debug, Clone)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column offset in the line.
    offset: usize,
}

/// An instruction line after the first pass.
#[derive(Debug)]
struct ParsedLine<'a> {
    line: usize,
    instr: Instruction,
    operands: Vec<Token<'a>>,
}

/// Wraps `err` with its source location.
fn at(line: usize, offset: usize, err: VMError) -> VMError {
    VMError::AssemblyError {
        line,
        offset,
        source: Box::new(err),
    }
}

/// Tokenize a single line of assembly.
///
/// Rules:
/// - `#` starts a comment
/// - commas and whitespace separate tokens
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let code = match line.find(COMMENT_CHAR) {
        Some(pos) => &line[..pos],
        None => line,
    };

    let mut out = Vec::with_capacity(4);
    let mut start: Option<usize> = None;
    for (i, c) in code.char_indices() {
        if c == ',' || c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push(Token {
                    text: &code[s..i],
                    offset: s + 1,
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(Token {
            text: &code[s..],
            offset: s + 1,
        });
    }
    out
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_register(text: &str) -> Result<u8, VMError> {
    let digits = text
        .strip_prefix('r')
        .or_else(|| text.strip_prefix('R'))
        .ok_or_else(|| VMError::ExpectedRegister(text.to_string()))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VMError::InvalidRegister(text.to_string()));
    }
    digits
        .parse::<u8>()
        .map_err(|_| VMError::InvalidRegister(text.to_string()))
}

fn parse_immediate(text: &str, labels: &HashMap<String, usize>) -> Result<u16, VMError> {
    let invalid = || VMError::InvalidImmediate(text.to_string());

    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        return u16::from_str_radix(hex, 16).map_err(|_| invalid());
    }
    if text.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') {
        return text.parse::<u16>().map_err(|_| invalid());
    }
    if is_identifier(text) {
        let offset = labels
            .get(text)
            .copied()
            .ok_or_else(|| VMError::UndefinedLabel(text.to_string()))?;
        return u16::try_from(offset).map_err(|_| invalid());
    }
    Err(invalid())
}

/// First pass: strips labels, records their offsets, and checks arity.
fn collect<'a>(
    source: &'a str,
) -> Result<(Vec<ParsedLine<'a>>, HashMap<String, usize>), VMError> {
    let mut lines = Vec::new();
    let mut labels = HashMap::new();
    let mut offset = 0usize;

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let mut tokens = tokenize(raw).into_iter().peekable();

        while let Some(tok) = tokens.next_if(|t| t.text.ends_with(LABEL_SUFFIX)) {
            let name = tok.text.trim_end_matches(LABEL_SUFFIX);
            if !is_identifier(name) {
                return Err(at(
                    line,
                    tok.offset,
                    VMError::InvalidInstructionName(tok.text.to_string()),
                ));
            }
            if labels.insert(name.to_string(), offset).is_some() {
                return Err(at(
                    line,
                    tok.offset,
                    VMError::DuplicateLabel(name.to_string()),
                ));
            }
        }

        let Some(head) = tokens.next() else {
            continue;
        };
        let instr = Instruction::from_mnemonic(head.text).ok_or_else(|| {
            at(
                line,
                head.offset,
                VMError::InvalidInstructionName(head.text.to_string()),
            )
        })?;

        let operands: Vec<Token<'a>> = tokens.collect();
        let expected = instr
            .operands()
            .iter()
            .filter(|k| **k != OperandKind::Pad)
            .count();
        if operands.len() != expected {
            return Err(at(
                line,
                head.offset,
                VMError::ArityMismatch {
                    instruction: instr.mnemonic(),
                    expected,
                    actual: operands.len(),
                },
            ));
        }

        offset += instr.width();
        lines.push(ParsedLine {
            line,
            instr,
            operands,
        });
    }

    Ok((lines, labels))
}

/// Second pass: encodes one instruction with labels already resolved.
fn encode(
    parsed: &ParsedLine<'_>,
    labels: &HashMap<String, usize>,
    out: &mut Vec<u8>,
) -> Result<(), VMError> {
    out.push(parsed.instr as u8);

    let mut operands = parsed.operands.iter();
    for kind in parsed.instr.operands() {
        if *kind == OperandKind::Pad {
            out.push(0);
            continue;
        }
        // Arity was checked in the first pass.
        let Some(tok) = operands.next() else {
            break;
        };
        let located = |err| at(parsed.line, tok.offset, err);
        match kind {
            OperandKind::Reg => out.push(parse_register(tok.text).map_err(located)?),
            OperandKind::ImmU16 => {
                let imm = parse_immediate(tok.text, labels).map_err(located)?;
                out.extend_from_slice(&imm.to_be_bytes());
            }
            OperandKind::Pad => {}
        }
    }
    Ok(())
}

/// Assembles source text into bytecode.
pub fn assemble_source(source: &str) -> Result<Vec<u8>, VMError> {
    let (lines, labels) = collect(source)?;
    let mut out = Vec::with_capacity(lines.iter().map(|l| l.instr.width()).sum());
    for parsed in &lines {
        encode(parsed, &labels, &mut out)?;
    }
    Ok(out)
}

/// Reads and assembles a source file.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, VMError> {
    let source = fs::read_to_string(path)?;
    assemble_source(&source)
}

/// Formats a compiler-style diagnostic for an assembly failure.
///
/// Errors without a source location are rendered as a single line.
pub fn render_diagnostic(file: &str, source: &str, err: &VMError) -> String {
    let VMError::AssemblyError {
        line,
        offset,
        source: cause,
    } = err
    else {
        return format!("error: {err}");
    };

    let mut diag = String::new();
    let _ = writeln!(diag, "error: {cause}");
    let _ = writeln!(diag, " --> {file}:{line}:{offset}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(offset.saturating_sub(1));
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "  | {}^", underline);
    }

    diag
}
