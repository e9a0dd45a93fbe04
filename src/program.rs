// program.rs - Compiled program buffer: header layout, flags, operand reads.
//
// The buffer is produced by an upstream compiler and only read here. The
// header is five little-endian u32 fields; instructions follow at
// OP_START_OFFSET. Every read is bounds-checked against the declared size.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::RegExpError;
use crate::opcode::{OpCode, RANGE_COUNT_SIZE};

// === Header Layout ===
pub const OCTETS_SIZE_OFFSET: usize = 0;
pub const NUM_CAPTURE_OFFSET: usize = 4;
pub const NUM_STACK_OFFSET: usize = 8;
pub const FLAGS_OFFSET: usize = 12;
pub const PREFILTER_OFFSET: usize = 16;
pub const OP_START_OFFSET: usize = 20;

/// Capture operands are one byte wide.
pub const MAX_CAPTURE_COUNT: u32 = 256;

bitflags! {
    /// RegExp flag bits as stored in the program header.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RegExpFlags: u32 {
        const GLOBAL = 1 << 0;
        const IGNORECASE = 1 << 1;
        const MULTILINE = 1 << 2;
        const DOTALL = 1 << 3;
        const UTF16 = 1 << 4;
        const STICKY = 1 << 5;
        const HASINDICES = 1 << 6;
    }
}

impl RegExpFlags {
    fn from_flag_char(c: char) -> Option<RegExpFlags> {
        let flag = match c {
            'd' => RegExpFlags::HASINDICES,
            'g' => RegExpFlags::GLOBAL,
            'i' => RegExpFlags::IGNORECASE,
            'm' => RegExpFlags::MULTILINE,
            's' => RegExpFlags::DOTALL,
            'u' => RegExpFlags::UTF16,
            'y' => RegExpFlags::STICKY,
            _ => return None,
        };
        Some(flag)
    }
}

impl FromStr for RegExpFlags {
    type Err = RegExpError;

    /// Parse a JS flag string such as `"gy"`. Unknown or repeated flags are
    /// rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = RegExpFlags::empty();
        for c in s.chars() {
            let bit = RegExpFlags::from_flag_char(c)
                .ok_or_else(|| RegExpError::InvalidFlags(s.to_string()))?;
            if flags.contains(bit) {
                return Err(RegExpError::InvalidFlags(s.to_string()));
            }
            flags |= bit;
        }
        Ok(flags)
    }
}

impl fmt::Display for RegExpFlags {
    /// Canonical flag order: `d g i m s u y`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const ORDER: [(RegExpFlags, char); 7] = [
            (RegExpFlags::HASINDICES, 'd'),
            (RegExpFlags::GLOBAL, 'g'),
            (RegExpFlags::IGNORECASE, 'i'),
            (RegExpFlags::MULTILINE, 'm'),
            (RegExpFlags::DOTALL, 's'),
            (RegExpFlags::UTF16, 'u'),
            (RegExpFlags::STICKY, 'y'),
        ];
        for (flag, c) in ORDER {
            if self.contains(flag) {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

// === ProgramHeader ===

/// Decoded header of a program buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramHeader {
    pub total_size: u32,
    pub capture_count: u32,
    pub stack_count: u32,
    pub flags: RegExpFlags,
    pub prefilter: u32,
}

impl ProgramHeader {
    /// Decode and validate the header at the front of `buffer`.
    pub fn parse(buffer: &[u8]) -> Result<Self, RegExpError> {
        if buffer.len() < OP_START_OFFSET {
            return Err(malformed(format!(
                "buffer holds {} bytes, header needs {}",
                buffer.len(),
                OP_START_OFFSET
            )));
        }
        let total_size = read_u32_le(buffer, OCTETS_SIZE_OFFSET);
        let capture_count = read_u32_le(buffer, NUM_CAPTURE_OFFSET);
        let stack_count = read_u32_le(buffer, NUM_STACK_OFFSET);
        let raw_flags = read_u32_le(buffer, FLAGS_OFFSET);
        let prefilter = read_u32_le(buffer, PREFILTER_OFFSET);

        if (total_size as usize) < OP_START_OFFSET || total_size as usize > buffer.len() {
            return Err(malformed(format!(
                "declared size {} outside [{}, {}]",
                total_size,
                OP_START_OFFSET,
                buffer.len()
            )));
        }
        if capture_count > MAX_CAPTURE_COUNT {
            return Err(malformed(format!("capture count {} too large", capture_count)));
        }
        let flags = RegExpFlags::from_bits(raw_flags)
            .ok_or_else(|| malformed(format!("unknown flag bits {:#x}", raw_flags)))?;

        Ok(ProgramHeader {
            total_size,
            capture_count,
            stack_count,
            flags,
            prefilter,
        })
    }

    /// The code unit every match starts with, if the compiler recorded one.
    pub fn prefilter_unit(&self) -> Option<u32> {
        self.prefilter.checked_sub(1)
    }
}

fn malformed(message: String) -> RegExpError {
    RegExpError::MalformedProgram { message }
}

#[inline]
fn read_u32_le(buffer: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
}

// === Program ===

/// Read-only, validated view over a compiled program buffer.
#[derive(Clone, Copy, Debug)]
pub struct Program<'a> {
    code: &'a [u8],
    header: ProgramHeader,
}

impl<'a> Program<'a> {
    pub fn new(buffer: &'a [u8]) -> Result<Self, RegExpError> {
        let header = ProgramHeader::parse(buffer)?;
        Ok(Program {
            code: &buffer[..header.total_size as usize],
            header,
        })
    }

    pub fn header(&self) -> &ProgramHeader {
        &self.header
    }

    pub fn flags(&self) -> RegExpFlags {
        self.header.flags
    }

    /// First byte past the instruction stream.
    pub fn end(&self) -> usize {
        self.code.len()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.code
    }

    #[inline]
    fn slice(&self, at: usize, len: usize) -> Result<&'a [u8], RegExpError> {
        at.checked_add(len)
            .and_then(|stop| self.code.get(at..stop))
            .ok_or(RegExpError::TruncatedInstruction { pc: at })
    }

    #[inline]
    pub fn read_u8(&self, at: usize) -> Result<u8, RegExpError> {
        self.code
            .get(at)
            .copied()
            .ok_or(RegExpError::TruncatedInstruction { pc: at })
    }

    #[inline]
    pub fn read_u16(&self, at: usize) -> Result<u16, RegExpError> {
        let b = self.slice(at, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    #[inline]
    pub fn read_u32(&self, at: usize) -> Result<u32, RegExpError> {
        let b = self.slice(at, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Decode the opcode byte at `pc`.
    pub fn opcode_at(&self, pc: usize) -> Result<OpCode, RegExpError> {
        let byte = self.read_u8(pc)?;
        OpCode::try_from(byte).map_err(|opcode| RegExpError::UndefinedBytecode { pc, opcode })
    }

    /// Total size of the instruction at `pc`, including counted operands.
    pub fn instruction_size(&self, pc: usize, op: OpCode) -> Result<usize, RegExpError> {
        match (op.fixed_size(), op.entry_size()) {
            (Some(size), _) => Ok(size),
            (None, Some(entry)) => {
                let count = self.read_u16(pc + 1)? as usize;
                Ok(1 + RANGE_COUNT_SIZE + count * entry)
            }
            (None, None) => Err(RegExpError::UndefinedBytecode { pc, opcode: op as u8 }),
        }
    }

    /// Resolve the branch operand of the instruction at `pc` whose size is
    /// `size`. The target must lie inside the instruction stream.
    pub fn branch_target(&self, pc: usize, size: usize) -> Result<usize, RegExpError> {
        let offset = self.read_u32(pc + 1)? as i32;
        let target = (pc + size) as i64 + offset as i64;
        if target < OP_START_OFFSET as i64 || target > self.end() as i64 {
            return Err(RegExpError::BranchOutOfRange { pc, target });
        }
        Ok(target as usize)
    }
}
