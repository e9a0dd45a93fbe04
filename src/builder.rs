// builder.rs - Assembler for program buffers.
//
// Emits instructions in the byte format read by the executor, tracks the
// capture and auxiliary stack counts, patches forward branches and writes the
// header on `finish`. This is an assembler, not a pattern parser: callers lay
// out the control flow themselves or use the structured helpers at the end.

use crate::opcode::*;
use crate::program::{
    RegExpFlags, FLAGS_OFFSET, NUM_CAPTURE_OFFSET, NUM_STACK_OFFSET, OCTETS_SIZE_OFFSET,
    OP_START_OFFSET, PREFILTER_OFFSET,
};

/// Incrementally assembles a program buffer.
///
/// Instructions carrying a branch return their pc so the target can be set
/// later with [`patch`](ProgramBuilder::patch).
#[derive(Clone, Debug)]
pub struct ProgramBuilder {
    code: Vec<u8>,
    capture_count: u32,
    stack_count: u32,
    flags: RegExpFlags,
    prefilter: u32,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        ProgramBuilder {
            code: vec![0; OP_START_OFFSET],
            capture_count: 0,
            stack_count: 0,
            flags: RegExpFlags::empty(),
            prefilter: 0,
        }
    }

    /// Offset of the next instruction.
    pub fn pc(&self) -> usize {
        self.code.len()
    }

    pub fn flags(&self) -> RegExpFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: RegExpFlags) -> &mut Self {
        self.flags = flags;
        self
    }

    /// Raise the capture count above what the emitted instructions imply.
    pub fn set_capture_count(&mut self, n: u32) -> &mut Self {
        self.capture_count = self.capture_count.max(n);
        self
    }

    /// Record the code unit every match must start with.
    pub fn set_prefilter(&mut self, unit: u16) -> &mut Self {
        self.prefilter = unit as u32 + 1;
        self
    }

    // ---- Operation management ----

    fn add_op(&mut self, op: OpCode) -> usize {
        let pc = self.code.len();
        self.code.push(op as u8);
        pc
    }

    fn add_u8(&mut self, v: u8) {
        self.code.push(v);
    }

    fn add_u16(&mut self, v: u16) {
        self.code.extend_from_slice(&v.to_le_bytes());
    }

    fn add_u32(&mut self, v: u32) {
        self.code.extend_from_slice(&v.to_le_bytes());
    }

    fn add_branch(&mut self, op: OpCode) -> usize {
        let pc = self.add_op(op);
        self.add_u32(0);
        pc
    }

    fn note_capture(&mut self, index: u8) {
        self.capture_count = self.capture_count.max(index as u32 + 1);
    }

    /// Point the branch of the instruction at `at` to `target`.
    ///
    /// # Panics
    ///
    /// Panics if `at` does not hold a branch instruction emitted by this
    /// builder.
    pub fn patch(&mut self, at: usize, target: usize) {
        let op = OpCode::try_from(self.code[at]).ok().filter(|op| op.has_branch());
        let size = op
            .and_then(OpCode::fixed_size)
            .unwrap_or_else(|| panic!("no branch instruction at {}", at));
        let offset = target as i64 - (at + size) as i64;
        self.code[at + 1..at + 5].copy_from_slice(&(offset as i32).to_le_bytes());
    }

    // ---- Characters ----

    /// Match one character; code points above the BMP use `OP_CHAR32`.
    pub fn char(&mut self, c: u32) -> usize {
        match u16::try_from(c) {
            Ok(unit) => {
                let pc = self.add_op(OpCode::Char);
                self.add_u16(unit);
                pc
            }
            Err(_) => {
                let pc = self.add_op(OpCode::Char32);
                self.add_u32(c);
                pc
            }
        }
    }

    /// Match `s`. In unicode mode astral characters become one `OP_CHAR32`,
    /// otherwise they are matched as two surrogate units.
    pub fn literal(&mut self, s: &str) -> usize {
        let pc = self.pc();
        let unicode = self.flags.contains(RegExpFlags::UTF16);
        let mut units = [0u16; 2];
        for ch in s.chars() {
            if unicode {
                self.char(ch as u32);
            } else {
                for &unit in ch.encode_utf16(&mut units).iter() {
                    self.char(unit as u32);
                }
            }
        }
        pc
    }

    pub fn dots(&mut self) -> usize {
        self.add_op(OpCode::Dots)
    }

    pub fn all(&mut self) -> usize {
        self.add_op(OpCode::All)
    }

    /// Character class over sorted, non-overlapping BMP ranges.
    pub fn range(&mut self, ranges: &[(u16, u16)]) -> usize {
        let pc = self.add_op(OpCode::Range);
        self.add_u16(ranges.len() as u16);
        for &(low, high) in ranges {
            self.add_u16(low);
            self.add_u16(high);
        }
        pc
    }

    pub fn range32(&mut self, ranges: &[(u32, u32)]) -> usize {
        let pc = self.add_op(OpCode::Range32);
        self.add_u16(ranges.len() as u16);
        for &(low, high) in ranges {
            self.add_u32(low);
            self.add_u32(high);
        }
        pc
    }

    /// Character set given as individual code points (sorted on emission).
    pub fn sparse(&mut self, chars: &[u32]) -> usize {
        let mut set = chars.to_vec();
        set.sort_unstable();
        set.dedup();
        let pc = self.add_op(OpCode::Sparse);
        self.add_u16(set.len() as u16);
        for c in set {
            self.add_u32(c);
        }
        pc
    }

    // ---- Anchors ----

    pub fn line_start(&mut self) -> usize {
        self.add_op(OpCode::LineStart)
    }

    pub fn line_end(&mut self) -> usize {
        self.add_op(OpCode::LineEnd)
    }

    pub fn word_boundary(&mut self) -> usize {
        self.add_op(OpCode::WordBoundary)
    }

    pub fn not_word_boundary(&mut self) -> usize {
        self.add_op(OpCode::NotWordBoundary)
    }

    pub fn prev(&mut self) -> usize {
        self.add_op(OpCode::Prev)
    }

    // ---- Captures ----

    pub fn save_start(&mut self, index: u8) -> usize {
        self.note_capture(index);
        let pc = self.add_op(OpCode::SaveStart);
        self.add_u8(index);
        pc
    }

    pub fn save_end(&mut self, index: u8) -> usize {
        self.note_capture(index);
        let pc = self.add_op(OpCode::SaveEnd);
        self.add_u8(index);
        pc
    }

    /// Reset groups `first..=last` to undefined.
    pub fn save_reset(&mut self, first: u8, last: u8) -> usize {
        self.note_capture(last.max(first));
        let pc = self.add_op(OpCode::SaveReset);
        self.add_u8(first);
        self.add_u8(last);
        pc
    }

    pub fn back_reference(&mut self, index: u8) -> usize {
        self.note_capture(index);
        let pc = self.add_op(OpCode::BackReference);
        self.add_u8(index);
        pc
    }

    pub fn backward_back_reference(&mut self, index: u8) -> usize {
        self.note_capture(index);
        let pc = self.add_op(OpCode::BackwardBackReference);
        self.add_u8(index);
        pc
    }

    // ---- Control flow ----

    pub fn goto(&mut self) -> usize {
        self.add_branch(OpCode::Goto)
    }

    pub fn goto_to(&mut self, target: usize) -> usize {
        let pc = self.goto();
        self.patch(pc, target);
        pc
    }

    /// Jump to the branch target, resuming after this instruction on failure.
    pub fn split_first(&mut self) -> usize {
        self.add_branch(OpCode::SplitFirst)
    }

    /// Continue after this instruction, resuming at the target on failure.
    pub fn split_next(&mut self) -> usize {
        self.add_branch(OpCode::SplitNext)
    }

    pub fn match_ahead(&mut self) -> usize {
        self.add_branch(OpCode::MatchAhead)
    }

    pub fn negative_match_ahead(&mut self) -> usize {
        self.add_branch(OpCode::NegativeMatchAhead)
    }

    /// Close the innermost lookahead body (`OP_MATCH`).
    pub fn close_lookahead(&mut self) -> usize {
        self.add_op(OpCode::Match)
    }

    pub fn match_end(&mut self) -> usize {
        self.add_op(OpCode::MatchEnd)
    }

    // ---- Loops and the auxiliary stack ----

    pub fn push(&mut self) -> usize {
        self.stack_count += 1;
        self.add_op(OpCode::Push)
    }

    pub fn push_char(&mut self) -> usize {
        self.stack_count += 1;
        self.add_op(OpCode::PushChar)
    }

    pub fn pop(&mut self) -> usize {
        self.add_op(OpCode::Pop)
    }

    pub fn check_char(&mut self) -> usize {
        self.add_branch(OpCode::CheckChar)
    }

    /// Loop back-edge to `start`, counting iterations in the top stack slot.
    pub fn loop_op(&mut self, greedy: bool, start: usize, min: u32, max: u32) -> usize {
        let op = if greedy { OpCode::LoopGreedy } else { OpCode::Loop };
        let pc = self.add_branch(op);
        self.add_u32(min);
        self.add_u32(max);
        self.patch(pc, start);
        pc
    }

    // ---- Structured helpers ----

    /// `SAVE_START index; body; SAVE_END index`.
    pub fn group<F>(&mut self, index: u8, body: F)
    where
        F: FnOnce(&mut Self),
    {
        self.save_start(index);
        body(self);
        self.save_end(index);
    }

    /// Try `left`, then `right`.
    pub fn alternate<L, R>(&mut self, left: L, right: R)
    where
        L: FnOnce(&mut Self),
        R: FnOnce(&mut Self),
    {
        let split = self.split_next();
        left(self);
        let skip = self.goto();
        let right_start = self.pc();
        self.patch(split, right_start);
        right(self);
        let end = self.pc();
        self.patch(skip, end);
    }

    /// Zero-width assertion that `body` matches (or, when `negative`, does not
    /// match) at the current position.
    pub fn lookahead<F>(&mut self, negative: bool, body: F)
    where
        F: FnOnce(&mut Self),
    {
        let open = if negative {
            self.negative_match_ahead()
        } else {
            self.match_ahead()
        };
        body(self);
        self.close_lookahead();
        let resume = self.pc();
        self.patch(open, resume);
    }

    /// Repeat `body` between `min` and `max` times (`INFINITE_REPEAT` for no
    /// bound). With `may_be_empty` an iteration that consumes nothing ends the
    /// loop.
    ///
    /// Layout: `PUSH [SPLIT exit] start: [PUSH_CHAR] body [CHECK_CHAR exit]
    /// LOOP start exit: POP`.
    pub fn quantifier<F>(&mut self, min: u32, max: u32, greedy: bool, may_be_empty: bool, body: F)
    where
        F: FnOnce(&mut Self),
    {
        if max == 0 || min > max {
            return;
        }
        self.push();
        let skip = (min == 0).then(|| {
            if greedy {
                self.split_next()
            } else {
                self.split_first()
            }
        });
        let start = self.pc();
        if may_be_empty {
            self.push_char();
        }
        body(self);
        let check = may_be_empty.then(|| self.check_char());
        self.loop_op(greedy, start, min, max);
        let exit = self.pc();
        self.pop();
        if let Some(pc) = skip {
            self.patch(pc, exit);
        }
        if let Some(pc) = check {
            self.patch(pc, exit);
        }
    }

    /// Write the header and return the finished buffer.
    pub fn finish(mut self) -> Vec<u8> {
        let total_size = self.code.len() as u32;
        let fields = [
            (OCTETS_SIZE_OFFSET, total_size),
            (NUM_CAPTURE_OFFSET, self.capture_count),
            (NUM_STACK_OFFSET, self.stack_count),
            (FLAGS_OFFSET, self.flags.bits()),
            (PREFILTER_OFFSET, self.prefilter),
        ];
        for (offset, value) in fields {
            self.code[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
        self.code
    }
}
