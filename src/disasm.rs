// disasm.rs - Human-readable listing of a program buffer.

use crate::error::RegExpError;
use crate::opcode::*;
use crate::program::{Program, OP_START_OFFSET};

/// Render the header and one line per instruction. Branch targets are shown
/// as absolute offsets.
///
/// ```
/// use regexp_vm::builder::ProgramBuilder;
/// use regexp_vm::disasm::disassemble;
///
/// let mut b = ProgramBuilder::new();
/// b.char('a' as u32);
/// b.match_end();
/// let listing = disassemble(&b.finish()).unwrap();
/// assert!(listing.contains("20: CHAR 'a'"));
/// ```
pub fn disassemble(buffer: &[u8]) -> Result<String, RegExpError> {
    let program = Program::new(buffer)?;
    let header = program.header();
    let mut out = format!(
        "size {} captures {} stack {} flags /{}/",
        header.total_size, header.capture_count, header.stack_count, header.flags
    );
    if let Some(unit) = header.prefilter_unit() {
        out.push_str(&format!(" prefilter {}", format_char(unit)));
    }
    out.push('\n');

    let mut pc = OP_START_OFFSET;
    while pc < program.end() {
        let op = program.opcode_at(pc)?;
        let size = program.instruction_size(pc, op)?;
        if pc + size > program.end() {
            return Err(RegExpError::TruncatedInstruction { pc });
        }
        out.push_str(&format!("{:>5}: {}", pc, op.name()));
        let operands = format_operands(&program, pc, op, size)?;
        if !operands.is_empty() {
            out.push(' ');
            out.push_str(&operands);
        }
        out.push('\n');
        pc += size;
    }
    Ok(out)
}

fn format_operands(
    program: &Program<'_>,
    pc: usize,
    op: OpCode,
    size: usize,
) -> Result<String, RegExpError> {
    let text = match op {
        OpCode::SaveStart
        | OpCode::SaveEnd
        | OpCode::BackReference
        | OpCode::BackwardBackReference => program.read_u8(pc + 1)?.to_string(),
        OpCode::SaveReset => format!(
            "{}..={}",
            program.read_u8(pc + 1)?,
            program.read_u8(pc + 2)?
        ),
        OpCode::Char => format_char(program.read_u16(pc + 1)? as u32),
        OpCode::Char32 => format_char(program.read_u32(pc + 1)?),
        OpCode::Goto
        | OpCode::SplitFirst
        | OpCode::SplitNext
        | OpCode::MatchAhead
        | OpCode::NegativeMatchAhead
        | OpCode::CheckChar => format!("-> {}", program.branch_target(pc, size)?),
        OpCode::Loop | OpCode::LoopGreedy => {
            let max = program.read_u32(pc + OP_SIZE_NINE)?;
            let max = if max == INFINITE_REPEAT {
                "inf".to_string()
            } else {
                max.to_string()
            };
            format!(
                "-> {} {{{},{}}}",
                program.branch_target(pc, size)?,
                program.read_u32(pc + OP_SIZE_FIVE)?,
                max
            )
        }
        OpCode::Range | OpCode::Range32 | OpCode::Sparse => {
            let count = program.read_u16(pc + 1)? as usize;
            let base = pc + 1 + RANGE_COUNT_SIZE;
            let mut items = Vec::with_capacity(count);
            for i in 0..count {
                let item = match op {
                    OpCode::Range => {
                        let at = base + i * RANGE16_ENTRY_SIZE;
                        format_range(program.read_u16(at)? as u32, program.read_u16(at + 2)? as u32)
                    }
                    OpCode::Range32 => {
                        let at = base + i * RANGE32_ENTRY_SIZE;
                        format_range(program.read_u32(at)?, program.read_u32(at + 4)?)
                    }
                    _ => format_char(program.read_u32(base + i * SPARSE_ENTRY_SIZE)?),
                };
                items.push(item);
            }
            format!("[{}]", items.join(" "))
        }
        _ => String::new(),
    };
    Ok(text)
}

fn format_range(low: u32, high: u32) -> String {
    if low == high {
        format_char(low)
    } else {
        format!("{}-{}", format_char(low), format_char(high))
    }
}

fn format_char(c: u32) -> String {
    match char::from_u32(c) {
        Some(ch) if (0x20..0x7f).contains(&c) => format!("'{}'", ch),
        _ => format!("U+{:04X}", c),
    }
}
