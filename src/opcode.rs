// opcode.rs - Instruction set of the regexp bytecode.
//
// One opcode byte followed by a fixed or counted operand block. Multi-byte
// operands are little-endian; branch offsets are i32 relative to the end of
// the instruction carrying them.

// === Operand Sizes ===
pub const OP_SIZE_ONE: usize = 1;
pub const OP_SIZE_TWO: usize = 2;
pub const OP_SIZE_THREE: usize = 3;
pub const OP_SIZE_FIVE: usize = 5;
pub const OP_SIZE_NINE: usize = 9;
pub const OP_SIZE_THIRTEEN: usize = 13;

/// Size of the `u16` count that prefixes range and sparse operands.
pub const RANGE_COUNT_SIZE: usize = 2;
pub const RANGE16_ENTRY_SIZE: usize = 4;
pub const RANGE32_ENTRY_SIZE: usize = 8;
pub const SPARSE_ENTRY_SIZE: usize = 4;

/// Loop bound meaning "no upper limit".
pub const INFINITE_REPEAT: u32 = u32::MAX;

// === OpCode Enum ===
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    SaveStart = 0,
    SaveEnd = 1,
    Char = 2,
    Goto = 3,
    SplitFirst = 4,
    SplitNext = 5,
    NegativeMatchAhead = 6,
    MatchAhead = 7,
    Match = 8,
    Loop = 9,
    LoopGreedy = 10,
    PushChar = 11,
    CheckChar = 12,
    Push = 13,
    Pop = 14,
    SaveReset = 15,
    LineStart = 16,
    LineEnd = 17,
    WordBoundary = 18,
    NotWordBoundary = 19,
    All = 20,
    Dots = 21,
    MatchEnd = 22,
    Prev = 23,
    Range = 24,
    BackReference = 25,
    BackwardBackReference = 26,
    Char32 = 27,
    Range32 = 28,
    Sparse = 29,
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        let op = match byte {
            0 => OpCode::SaveStart,
            1 => OpCode::SaveEnd,
            2 => OpCode::Char,
            3 => OpCode::Goto,
            4 => OpCode::SplitFirst,
            5 => OpCode::SplitNext,
            6 => OpCode::NegativeMatchAhead,
            7 => OpCode::MatchAhead,
            8 => OpCode::Match,
            9 => OpCode::Loop,
            10 => OpCode::LoopGreedy,
            11 => OpCode::PushChar,
            12 => OpCode::CheckChar,
            13 => OpCode::Push,
            14 => OpCode::Pop,
            15 => OpCode::SaveReset,
            16 => OpCode::LineStart,
            17 => OpCode::LineEnd,
            18 => OpCode::WordBoundary,
            19 => OpCode::NotWordBoundary,
            20 => OpCode::All,
            21 => OpCode::Dots,
            22 => OpCode::MatchEnd,
            23 => OpCode::Prev,
            24 => OpCode::Range,
            25 => OpCode::BackReference,
            26 => OpCode::BackwardBackReference,
            27 => OpCode::Char32,
            28 => OpCode::Range32,
            29 => OpCode::Sparse,
            other => return Err(other),
        };
        Ok(op)
    }
}

impl OpCode {
    /// Instruction size in bytes, or `None` for counted operands
    /// (`Range`, `Range32`, `Sparse`) whose size depends on the entry count.
    pub fn fixed_size(self) -> Option<usize> {
        let size = match self {
            OpCode::SaveStart
            | OpCode::SaveEnd
            | OpCode::BackReference
            | OpCode::BackwardBackReference => OP_SIZE_TWO,
            OpCode::Char | OpCode::SaveReset => OP_SIZE_THREE,
            OpCode::Goto
            | OpCode::SplitFirst
            | OpCode::SplitNext
            | OpCode::NegativeMatchAhead
            | OpCode::MatchAhead
            | OpCode::CheckChar
            | OpCode::Char32 => OP_SIZE_FIVE,
            OpCode::Loop | OpCode::LoopGreedy => OP_SIZE_THIRTEEN,
            OpCode::Match
            | OpCode::PushChar
            | OpCode::Push
            | OpCode::Pop
            | OpCode::LineStart
            | OpCode::LineEnd
            | OpCode::WordBoundary
            | OpCode::NotWordBoundary
            | OpCode::All
            | OpCode::Dots
            | OpCode::MatchEnd
            | OpCode::Prev => OP_SIZE_ONE,
            OpCode::Range | OpCode::Range32 | OpCode::Sparse => return None,
        };
        Some(size)
    }

    /// Size of one entry of a counted operand.
    pub fn entry_size(self) -> Option<usize> {
        match self {
            OpCode::Range => Some(RANGE16_ENTRY_SIZE),
            OpCode::Range32 => Some(RANGE32_ENTRY_SIZE),
            OpCode::Sparse => Some(SPARSE_ENTRY_SIZE),
            _ => None,
        }
    }

    /// True for instructions whose first operand is a relative branch offset.
    pub fn has_branch(self) -> bool {
        matches!(
            self,
            OpCode::Goto
                | OpCode::SplitFirst
                | OpCode::SplitNext
                | OpCode::NegativeMatchAhead
                | OpCode::MatchAhead
                | OpCode::CheckChar
                | OpCode::Loop
                | OpCode::LoopGreedy
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::SaveStart => "SAVE_START",
            OpCode::SaveEnd => "SAVE_END",
            OpCode::Char => "CHAR",
            OpCode::Goto => "GOTO",
            OpCode::SplitFirst => "SPLIT_FIRST",
            OpCode::SplitNext => "SPLIT_NEXT",
            OpCode::NegativeMatchAhead => "NEGATIVE_MATCH_AHEAD",
            OpCode::MatchAhead => "MATCH_AHEAD",
            OpCode::Match => "MATCH",
            OpCode::Loop => "LOOP",
            OpCode::LoopGreedy => "LOOP_GREEDY",
            OpCode::PushChar => "PUSH_CHAR",
            OpCode::CheckChar => "CHECK_CHAR",
            OpCode::Push => "PUSH",
            OpCode::Pop => "POP",
            OpCode::SaveReset => "SAVE_RESET",
            OpCode::LineStart => "LINE_START",
            OpCode::LineEnd => "LINE_END",
            OpCode::WordBoundary => "WORD_BOUNDARY",
            OpCode::NotWordBoundary => "NOT_WORD_BOUNDARY",
            OpCode::All => "ALL",
            OpCode::Dots => "DOTS",
            OpCode::MatchEnd => "MATCH_END",
            OpCode::Prev => "PREV",
            OpCode::Range => "RANGE",
            OpCode::BackReference => "BACKREFERENCE",
            OpCode::BackwardBackReference => "BACKWARD_BACKREFERENCE",
            OpCode::Char32 => "CHAR32",
            OpCode::Range32 => "RANGE32",
            OpCode::Sparse => "SPARSE",
        }
    }
}
