// error.rs - Error type for program validation and execution.
//
// Ordinary match failure is not an error: `execute` returns `Ok(false)`.
// Everything here means the program buffer, the call arguments, or a
// resource limit is at fault.

use std::fmt;

/// Error type for loading and executing a compiled regexp program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegExpError {
    /// Scratch buffer allocation failed.
    Memory,
    /// Backtrack stack reached the configured entry limit.
    MatchStackLimitOver,
    /// Backtrack stack would exceed the `u32` byte-size ceiling.
    StateStackOverflow,
    /// Failure recoveries exceeded the configured retry limit.
    RetryLimitInMatchOver,
    /// Header fields are missing or inconsistent.
    MalformedProgram { message: String },
    /// An operand read would run past the end of the program.
    TruncatedInstruction { pc: usize },
    /// The byte at `pc` is not a known opcode.
    UndefinedBytecode { pc: usize, opcode: u8 },
    /// A branch operand points outside the instruction stream.
    BranchOutOfRange { pc: usize, target: i64 },
    /// A capture operand is not below the header's capture count.
    CaptureOutOfRange { pc: usize, index: u32 },
    /// A push exceeded the header's stack slot count.
    StackSlotOverflow { pc: usize },
    /// A pop or peek found the auxiliary stack empty.
    StackUnderflow { pc: usize },
    /// `OP_MATCH` without an open lookahead.
    UnbalancedLookahead { pc: usize },
    /// `last_index` is past the end of the input.
    LastIndexOutOfRange { last_index: usize, length: usize },
    /// The input buffer is shorter than `length` characters.
    InputTooShort { needed: usize, actual: usize },
    /// A flag string contains an unknown or repeated flag.
    InvalidFlags(String),
}

impl fmt::Display for RegExpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegExpError::Memory => write!(f, "memory allocation failed"),
            RegExpError::MatchStackLimitOver => write!(f, "match-stack limit over"),
            RegExpError::StateStackOverflow => write!(f, "backtrack stack size overflow"),
            RegExpError::RetryLimitInMatchOver => write!(f, "retry-limit-in-match over"),
            RegExpError::MalformedProgram { message } => {
                write!(f, "malformed program: {}", message)
            }
            RegExpError::TruncatedInstruction { pc } => {
                write!(f, "truncated instruction at pc {}", pc)
            }
            RegExpError::UndefinedBytecode { pc, opcode } => {
                write!(f, "undefined bytecode {:#04x} at pc {}", opcode, pc)
            }
            RegExpError::BranchOutOfRange { pc, target } => {
                write!(f, "branch at pc {} targets {} outside the program", pc, target)
            }
            RegExpError::CaptureOutOfRange { pc, index } => {
                write!(f, "capture {} out of range at pc {}", index, pc)
            }
            RegExpError::StackSlotOverflow { pc } => {
                write!(f, "stack slot overflow at pc {}", pc)
            }
            RegExpError::StackUnderflow { pc } => write!(f, "stack underflow at pc {}", pc),
            RegExpError::UnbalancedLookahead { pc } => {
                write!(f, "match without lookahead at pc {}", pc)
            }
            RegExpError::LastIndexOutOfRange { last_index, length } => {
                write!(f, "last index {} exceeds input length {}", last_index, length)
            }
            RegExpError::InputTooShort { needed, actual } => {
                write!(f, "input holds {} bytes, {} needed", actual, needed)
            }
            RegExpError::InvalidFlags(flags) => {
                write!(f, "invalid regular expression flags '{}'", flags)
            }
        }
    }
}

impl std::error::Error for RegExpError {}

impl RegExpError {
    /// Returns true for errors caused by a bad program buffer rather than
    /// by the input or a resource limit.
    pub fn is_program_bug(&self) -> bool {
        matches!(
            self,
            RegExpError::MalformedProgram { .. }
                | RegExpError::TruncatedInstruction { .. }
                | RegExpError::UndefinedBytecode { .. }
                | RegExpError::BranchOutOfRange { .. }
                | RegExpError::CaptureOutOfRange { .. }
                | RegExpError::StackSlotOverflow { .. }
                | RegExpError::StackUnderflow { .. }
                | RegExpError::UnbalancedLookahead { .. }
        )
    }

    /// Returns true when a configured or hard resource limit stopped execution.
    pub fn is_resource_limit(&self) -> bool {
        matches!(
            self,
            RegExpError::Memory
                | RegExpError::MatchStackLimitOver
                | RegExpError::StateStackOverflow
                | RegExpError::RetryLimitInMatchOver
        )
    }
}

impl From<std::collections::TryReserveError> for RegExpError {
    fn from(_: std::collections::TryReserveError) -> Self {
        RegExpError::Memory
    }
}
