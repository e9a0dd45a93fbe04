// executor.rs - Backtracking interpreter for compiled regexp programs.
//
// Structure: global limits -> backtrack state types -> RegExpExecutor
// (execute, dispatch loop, failure recovery, stack operations) -> result
// extraction.
//
// The backtrack stack is an undo log. Choice points (Split and the two
// lookahead markers) record where to resume; Save/Push/Pop/Set record the
// previous value of whatever they overwrote so popping them restores it.

use std::io;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use log::{debug, trace};
use smallvec::SmallVec;

use crate::error::RegExpError;
use crate::opcode::*;
use crate::program::{Program, RegExpFlags, OP_START_OFFSET};
use crate::region::{MatchRegion, REGION_UNDEFINED_END, REGION_UNDEFINED_START};
use crate::subject::{canonicalize, is_line_terminator, is_word_char, Subject};

// ============================================================================
// Global Limits
// ============================================================================

pub const DEFAULT_MATCH_STACK_LIMIT_SIZE: u32 = 0;
pub const DEFAULT_RETRY_LIMIT_IN_MATCH: u64 = 0;

static MATCH_STACK_LIMIT: AtomicU32 = AtomicU32::new(DEFAULT_MATCH_STACK_LIMIT_SIZE);
static RETRY_LIMIT_IN_MATCH: AtomicU64 = AtomicU64::new(DEFAULT_RETRY_LIMIT_IN_MATCH);

/// Maximum number of backtrack entries per `execute` (0 = unlimited).
pub fn set_match_stack_limit(n: u32) { MATCH_STACK_LIMIT.store(n, Ordering::Relaxed); }
pub fn get_match_stack_limit() -> u32 { MATCH_STACK_LIMIT.load(Ordering::Relaxed) }
/// Maximum number of failure recoveries per `execute` (0 = unlimited).
pub fn set_retry_limit_in_match(n: u64) { RETRY_LIMIT_IN_MATCH.store(n, Ordering::Relaxed); }
pub fn get_retry_limit_in_match() -> u64 { RETRY_LIMIT_IN_MATCH.load(Ordering::Relaxed) }

/// Smallest backtrack stack capacity once the stack has grown at all.
pub const MIN_STATE_STACK_SIZE: usize = 64;
/// Backtrack stack storage may not exceed a u32 byte count.
const MAX_STATE_STACK_BYTES: usize = u32::MAX as usize;

/// Resource limits applied to one executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecLimits {
    pub match_stack_limit: u32,
    pub retry_limit_in_match: u64,
}

impl ExecLimits {
    pub fn unlimited() -> Self {
        ExecLimits {
            match_stack_limit: 0,
            retry_limit_in_match: 0,
        }
    }
}

impl Default for ExecLimits {
    /// Snapshot of the process-wide limits.
    fn default() -> Self {
        ExecLimits {
            match_stack_limit: get_match_stack_limit(),
            retry_limit_in_match: get_retry_limit_in_match(),
        }
    }
}

// ============================================================================
// Backtrack State Types
// ============================================================================

/// Start/end character positions of one capture group; `None` is undefined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureState {
    pub capture_start: Option<usize>,
    pub capture_end: Option<usize>,
}

impl CaptureState {
    /// The captured range when both ends are set and ordered.
    pub fn range(&self) -> Option<(usize, usize)> {
        match (self.capture_start, self.capture_end) {
            (Some(start), Some(end)) if end >= start => Some((start, end)),
            _ => None,
        }
    }
}

/// Backtrack stack entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegExpState {
    /// Choice point: resume at `pc` with position `pos`.
    Split { pc: usize, pos: usize },
    /// Open positive lookahead; `pc` is the continuation after its body.
    MatchAhead { pc: usize, pos: usize },
    /// Open negative lookahead; `pc` is the continuation after its body.
    NegativeMatchAhead { pc: usize, pos: usize },
    /// Capture slot overwrite; `prev` is the value to restore.
    Save { index: u32, is_end: bool, prev: Option<usize> },
    /// Auxiliary stack push.
    Push,
    /// Auxiliary stack pop of `value`.
    Pop { value: usize },
    /// Auxiliary stack top overwrite; `value` is the previous top.
    Set { value: usize },
}

impl RegExpState {
    #[inline]
    fn is_ahead_marker(&self) -> bool {
        matches!(
            self,
            RegExpState::MatchAhead { .. } | RegExpState::NegativeMatchAhead { .. }
        )
    }

    #[inline]
    fn is_choice_point(&self) -> bool {
        matches!(self, RegExpState::Split { .. }) || self.is_ahead_marker()
    }
}

// ============================================================================
// RegExpExecutor
// ============================================================================

/// Interprets a compiled program against one input per `execute` call.
///
/// Scratch buffers (captures, auxiliary stack, backtrack stack) are owned by
/// the executor and reused across calls. An executor is not shared between
/// threads; create one per thread.
pub struct RegExpExecutor {
    capture_result_list: SmallVec<[CaptureState; 8]>,
    stack: Vec<usize>,
    state_stack: Vec<RegExpState>,
    state_stack_size: usize,
    current_pc: usize,
    current_pos: usize,
    n_capture: u32,
    n_stack: u32,
    flags: RegExpFlags,
    prefilter: Option<u32>,
    retry_anchor: bool,
    is_wide_char: bool,
    limits: ExecLimits,
    retry_counter: u64,
}

impl Default for RegExpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RegExpExecutor {
    pub fn new() -> Self {
        Self::with_limits(ExecLimits::default())
    }

    pub fn with_limits(limits: ExecLimits) -> Self {
        RegExpExecutor {
            capture_result_list: SmallVec::new(),
            stack: Vec::new(),
            state_stack: Vec::new(),
            state_stack_size: 0,
            current_pc: OP_START_OFFSET,
            current_pos: 0,
            n_capture: 0,
            n_stack: 0,
            flags: RegExpFlags::empty(),
            prefilter: None,
            retry_anchor: false,
            is_wide_char: false,
            limits,
            retry_counter: 0,
        }
    }

    pub fn limits(&self) -> ExecLimits {
        self.limits
    }

    /// Flags of the most recently executed program.
    pub fn flags(&self) -> RegExpFlags {
        self.flags
    }

    /// Whether the last input used two bytes per character.
    pub fn is_wide_char(&self) -> bool {
        self.is_wide_char
    }

    pub fn capture_count(&self) -> usize {
        self.n_capture as usize
    }

    /// Capture slots of the last execution.
    pub fn captures(&self) -> &[CaptureState] {
        &self.capture_result_list
    }

    pub fn state_stack_len(&self) -> usize {
        self.state_stack.len()
    }

    pub fn state_stack_capacity(&self) -> usize {
        self.state_stack_size
    }

    /// Run `program_buffer` against a raw host buffer of `length` characters,
    /// each two bytes wide (native-endian UTF-16) when `is_wide_char` is set
    /// and one byte otherwise. Matching starts at character `last_index`.
    ///
    /// Returns `Ok(true)` when the program reaches `OP_MATCH_END`.
    pub fn execute(
        &mut self,
        input: &[u8],
        last_index: u32,
        length: u32,
        program_buffer: &[u8],
        is_wide_char: bool,
    ) -> Result<bool, RegExpError> {
        let subject = Subject::from_raw(input, length as usize, is_wide_char)?;
        self.execute_subject(subject, last_index as usize, program_buffer)
    }

    /// Same as [`execute`](Self::execute) for an already wrapped subject.
    pub fn execute_subject(
        &mut self,
        subject: Subject<'_>,
        last_index: usize,
        program_buffer: &[u8],
    ) -> Result<bool, RegExpError> {
        let program = Program::new(program_buffer)?;
        let length = subject.len();
        if last_index > length {
            return Err(RegExpError::LastIndexOutOfRange { last_index, length });
        }

        let header = *program.header();
        self.n_capture = header.capture_count;
        self.n_stack = header.stack_count;
        self.flags = header.flags;
        self.prefilter = if header.flags.contains(RegExpFlags::IGNORECASE) {
            None
        } else {
            header.prefilter_unit()
        };
        self.is_wide_char = subject.is_wide_char();
        self.retry_counter = 0;

        self.capture_result_list.clear();
        self.capture_result_list
            .resize(self.n_capture as usize, CaptureState::default());
        self.stack.clear();
        self.stack
            .try_reserve(self.n_stack as usize)?;
        self.state_stack.clear();
        self.current_pc = OP_START_OFFSET;
        self.current_pos = last_index;
        self.retry_anchor = !self.flags.contains(RegExpFlags::STICKY);

        debug!(
            "execute: len={} last_index={} captures={} stack={} flags={:?} wide={}",
            length, last_index, self.n_capture, self.n_stack, self.flags, self.is_wide_char
        );

        if self.retry_anchor {
            match self.next_candidate(&subject, last_index) {
                Some(pos) => self.current_pos = pos,
                None => {
                    debug!("execute: prefilter found no start position");
                    return Ok(false);
                }
            }
            self.push_regexp_state(RegExpState::Split {
                pc: OP_START_OFFSET,
                pos: self.current_pos,
            })?;
        }

        let matched = self.execute_internal(&program, &subject)?;
        debug!("execute: matched={} retries={}", matched, self.retry_counter);
        Ok(matched)
    }

    // ---- Dispatch loop ----

    fn execute_internal(
        &mut self,
        program: &Program<'_>,
        subject: &Subject<'_>,
    ) -> Result<bool, RegExpError> {
        let pc_end = program.end();
        let ignore_case = self.flags.contains(RegExpFlags::IGNORECASE);
        let unicode = self.flags.contains(RegExpFlags::UTF16);
        let multiline = self.flags.contains(RegExpFlags::MULTILINE);

        while self.current_pc < pc_end {
            let pc = self.current_pc;
            let op = program.opcode_at(pc)?;
            let mut goto_fail = false;
            trace!("pc {:>5} {:<22} pos {}", pc, op.name(), self.current_pos);

            match op {
                // ============================================================
                // Characters
                // ============================================================
                OpCode::Char | OpCode::Char32 => {
                    let (expected, size) = if op == OpCode::Char {
                        (program.read_u16(pc + 1)? as u32, OP_SIZE_THREE)
                    } else {
                        (program.read_u32(pc + 1)?, OP_SIZE_FIVE)
                    };
                    let hit = self.consume_if(subject, unicode, |c| {
                        c == expected
                            || (ignore_case
                                && canonicalize(c, unicode) == canonicalize(expected, unicode))
                    });
                    if hit {
                        self.current_pc = pc + size;
                    } else {
                        goto_fail = true;
                    }
                }

                OpCode::Dots | OpCode::All => {
                    let any = op == OpCode::All;
                    if self.consume_if(subject, unicode, |c| any || !is_line_terminator(c)) {
                        self.current_pc = pc + OP_SIZE_ONE;
                    } else {
                        goto_fail = true;
                    }
                }

                OpCode::Range | OpCode::Range32 | OpCode::Sparse => {
                    let size = program.instruction_size(pc, op)?;
                    let width = match subject.char_at(self.current_pos, unicode) {
                        Some((c, width)) => class_contains(program, pc, op, c)?.then_some(width),
                        None => None,
                    };
                    match width {
                        Some(width) => {
                            self.current_pos += width;
                            self.current_pc = pc + size;
                        }
                        None => goto_fail = true,
                    }
                }

                // ============================================================
                // Anchors
                // ============================================================
                OpCode::LineStart => {
                    let pos = self.current_pos;
                    let at_start = pos == 0
                        || (multiline
                            && subject
                                .char_before(pos, unicode)
                                .is_some_and(|(c, _)| is_line_terminator(c)));
                    if at_start {
                        self.current_pc = pc + OP_SIZE_ONE;
                    } else {
                        goto_fail = true;
                    }
                }

                OpCode::LineEnd => {
                    let pos = self.current_pos;
                    let at_end = pos == subject.len()
                        || (multiline
                            && subject
                                .char_at(pos, unicode)
                                .is_some_and(|(c, _)| is_line_terminator(c)));
                    if at_end {
                        self.current_pc = pc + OP_SIZE_ONE;
                    } else {
                        goto_fail = true;
                    }
                }

                OpCode::WordBoundary | OpCode::NotWordBoundary => {
                    let pos = self.current_pos;
                    let before = subject
                        .char_before(pos, unicode)
                        .is_some_and(|(c, _)| is_word_char(c));
                    let after = subject
                        .char_at(pos, unicode)
                        .is_some_and(|(c, _)| is_word_char(c));
                    let boundary = before != after;
                    if boundary == (op == OpCode::WordBoundary) {
                        self.current_pc = pc + OP_SIZE_ONE;
                    } else {
                        goto_fail = true;
                    }
                }

                OpCode::Prev => match subject.char_before(self.current_pos, unicode) {
                    Some((_, width)) => {
                        self.current_pos -= width;
                        self.current_pc = pc + OP_SIZE_ONE;
                    }
                    None => goto_fail = true,
                },

                // ============================================================
                // Captures
                // ============================================================
                OpCode::SaveStart | OpCode::SaveEnd => {
                    let index = program.read_u8(pc + 1)? as u32;
                    self.check_capture(pc, index)?;
                    let pos = self.current_pos;
                    self.save_capture(index, op == OpCode::SaveEnd, Some(pos))?;
                    self.current_pc = pc + OP_SIZE_TWO;
                }

                OpCode::SaveReset => {
                    let first = program.read_u8(pc + 1)? as u32;
                    let last = program.read_u8(pc + 2)? as u32;
                    for index in first..=last {
                        self.check_capture(pc, index)?;
                        self.save_capture(index, false, None)?;
                        self.save_capture(index, true, None)?;
                    }
                    self.current_pc = pc + OP_SIZE_THREE;
                }

                // ============================================================
                // Control flow
                // ============================================================
                OpCode::Goto => {
                    self.current_pc = program.branch_target(pc, OP_SIZE_FIVE)?;
                }

                OpCode::SplitNext => {
                    let target = program.branch_target(pc, OP_SIZE_FIVE)?;
                    self.push_regexp_state(RegExpState::Split {
                        pc: target,
                        pos: self.current_pos,
                    })?;
                    self.current_pc = pc + OP_SIZE_FIVE;
                }

                OpCode::SplitFirst => {
                    let target = program.branch_target(pc, OP_SIZE_FIVE)?;
                    self.push_regexp_state(RegExpState::Split {
                        pc: pc + OP_SIZE_FIVE,
                        pos: self.current_pos,
                    })?;
                    self.current_pc = target;
                }

                OpCode::MatchAhead | OpCode::NegativeMatchAhead => {
                    let target = program.branch_target(pc, OP_SIZE_FIVE)?;
                    let pos = self.current_pos;
                    let marker = if op == OpCode::MatchAhead {
                        RegExpState::MatchAhead { pc: target, pos }
                    } else {
                        RegExpState::NegativeMatchAhead { pc: target, pos }
                    };
                    self.push_regexp_state(marker)?;
                    self.current_pc = pc + OP_SIZE_FIVE;
                }

                OpCode::Match => {
                    goto_fail = self.close_lookahead(pc)?;
                }

                // ============================================================
                // Loops and the auxiliary stack
                // ============================================================
                OpCode::Loop | OpCode::LoopGreedy => {
                    let loop_start = program.branch_target(pc, OP_SIZE_THIRTEEN)?;
                    let min = program.read_u32(pc + OP_SIZE_FIVE)? as usize;
                    let max = program.read_u32(pc + OP_SIZE_NINE)? as usize;
                    let loop_end = pc + OP_SIZE_THIRTEEN;
                    let greedy = op == OpCode::LoopGreedy;
                    let limit = if greedy { max } else { min };

                    let count = self.peek_stack(pc)?.saturating_add(1);
                    self.set_stack_value(pc, count)?;
                    let pos = self.current_pos;
                    if count < limit {
                        if count >= min {
                            self.push_regexp_state(RegExpState::Split { pc: loop_end, pos })?;
                        }
                        self.current_pc = loop_start;
                    } else {
                        if !greedy && count < max {
                            self.push_regexp_state(RegExpState::Split { pc: loop_start, pos })?;
                        }
                        self.current_pc = loop_end;
                    }
                }

                OpCode::Push => {
                    self.push_stack(pc, 0)?;
                    self.current_pc = pc + OP_SIZE_ONE;
                }

                OpCode::PushChar => {
                    self.push_stack(pc, self.current_pos)?;
                    self.current_pc = pc + OP_SIZE_ONE;
                }

                OpCode::Pop => {
                    self.pop_stack(pc)?;
                    self.current_pc = pc + OP_SIZE_ONE;
                }

                OpCode::CheckChar => {
                    let exit = program.branch_target(pc, OP_SIZE_FIVE)?;
                    let entry_pos = self.pop_stack(pc)?;
                    if entry_pos == self.current_pos {
                        // zero-width iteration: leave the loop
                        self.current_pc = exit;
                    } else {
                        self.current_pc = pc + OP_SIZE_FIVE;
                    }
                }

                // ============================================================
                // Backreferences
                // ============================================================
                OpCode::BackReference | OpCode::BackwardBackReference => {
                    let index = program.read_u8(pc + 1)? as u32;
                    self.check_capture(pc, index)?;
                    let forward = op == OpCode::BackReference;
                    if self.match_backreference(subject, index, forward, ignore_case, unicode) {
                        self.current_pc = pc + OP_SIZE_TWO;
                    } else {
                        goto_fail = true;
                    }
                }

                OpCode::MatchEnd => {
                    self.match_failed(true, subject)?;
                    return Ok(true);
                }
            }

            if goto_fail && self.match_failed(false, subject)? {
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Consume one character if `accept` holds for it.
    #[inline]
    fn consume_if<F>(&mut self, subject: &Subject<'_>, unicode: bool, accept: F) -> bool
    where
        F: FnOnce(u32) -> bool,
    {
        match subject.char_at(self.current_pos, unicode) {
            Some((c, width)) if accept(c) => {
                self.current_pos += width;
                true
            }
            _ => false,
        }
    }

    fn match_backreference(
        &mut self,
        subject: &Subject<'_>,
        index: u32,
        forward: bool,
        ignore_case: bool,
        unicode: bool,
    ) -> bool {
        let Some((start, end)) = self.capture_result_list[index as usize].range() else {
            // an undefined group matches the empty string
            return true;
        };
        let len = end - start;
        let pos = self.current_pos;
        let from = if forward {
            pos
        } else {
            match pos.checked_sub(len) {
                Some(from) => from,
                None => return false,
            }
        };
        if from + len > subject.len() {
            return false;
        }
        let equal = (0..len).all(|i| match (subject.unit(start + i), subject.unit(from + i)) {
            (Some(a), Some(b)) => {
                a == b || (ignore_case && canonicalize(a, unicode) == canonicalize(b, unicode))
            }
            _ => false,
        });
        if equal {
            self.current_pos = if forward { pos + len } else { from };
        }
        equal
    }

    fn check_capture(&self, pc: usize, index: u32) -> Result<(), RegExpError> {
        if index >= self.n_capture {
            return Err(RegExpError::CaptureOutOfRange { pc, index });
        }
        Ok(())
    }

    fn save_capture(
        &mut self,
        index: u32,
        is_end: bool,
        value: Option<usize>,
    ) -> Result<(), RegExpError> {
        let slot = self.capture_result_list[index as usize];
        let prev = if is_end {
            slot.capture_end
        } else {
            slot.capture_start
        };
        self.push_regexp_state(RegExpState::Save { index, is_end, prev })?;
        let slot = &mut self.capture_result_list[index as usize];
        if is_end {
            slot.capture_end = value;
        } else {
            slot.capture_start = value;
        }
        Ok(())
    }

    // ---- Lookahead and failure recovery ----

    /// Resolve `OP_MATCH` against the innermost open lookahead. Returns true
    /// when the match must fail (a negative lookahead body matched).
    fn close_lookahead(&mut self, pc: usize) -> Result<bool, RegExpError> {
        let marker = self
            .state_stack
            .iter()
            .rposition(RegExpState::is_ahead_marker)
            .ok_or(RegExpError::UnbalancedLookahead { pc })?;

        if let RegExpState::MatchAhead { pc: resume, pos } = self.state_stack[marker] {
            // The assertion is atomic: drop its choice points but keep the
            // undo records so captures set inside it can still be unwound.
            let kept: SmallVec<[RegExpState; 16]> = self
                .state_stack
                .drain(marker..)
                .skip(1)
                .filter(|state| !state.is_choice_point())
                .collect();
            self.state_stack.extend(kept);
            self.current_pc = resume;
            self.current_pos = pos;
            return Ok(false);
        }

        while self.state_stack.len() > marker {
            self.pop_regexp_state();
        }
        Ok(true)
    }

    /// Failure recovery. With `is_matched` the current path committed and the
    /// backtrack stack is cleared. Otherwise pops entries, undoing their
    /// effects, until a choice point resumes. Returns true when no choice
    /// point is left.
    fn match_failed(&mut self, is_matched: bool, subject: &Subject<'_>) -> Result<bool, RegExpError> {
        if is_matched {
            self.state_stack.clear();
            return Ok(true);
        }

        self.retry_counter += 1;
        let limit = self.limits.retry_limit_in_match;
        if limit != 0 && self.retry_counter > limit {
            return Err(RegExpError::RetryLimitInMatchOver);
        }

        while let Some(state) = self.pop_regexp_state() {
            match state {
                RegExpState::Split { pc, pos } => {
                    if self.retry_anchor && self.state_stack.is_empty() {
                        return self.retry_at_next_position(subject, pos);
                    }
                    trace!("backtrack: resume pc {} pos {}", pc, pos);
                    self.current_pc = pc;
                    self.current_pos = pos;
                    return Ok(false);
                }
                RegExpState::NegativeMatchAhead { pc, pos } => {
                    // body failed, so the negative assertion holds
                    self.current_pc = pc;
                    self.current_pos = pos;
                    return Ok(false);
                }
                _ => {}
            }
        }
        Ok(true)
    }

    /// The bottom choice point of a non-sticky run: restart the program one
    /// character after the failed start position.
    fn retry_at_next_position(
        &mut self,
        subject: &Subject<'_>,
        failed_start: usize,
    ) -> Result<bool, RegExpError> {
        if failed_start >= subject.len() {
            return Ok(true);
        }
        let unicode = self.flags.contains(RegExpFlags::UTF16);
        let next = subject.advance_index(failed_start, unicode);
        let Some(start) = self.next_candidate(subject, next) else {
            return Ok(true);
        };
        trace!("retry: start position {}", start);
        self.push_regexp_state(RegExpState::Split {
            pc: OP_START_OFFSET,
            pos: start,
        })?;
        self.current_pc = OP_START_OFFSET;
        self.current_pos = start;
        Ok(false)
    }

    /// First start position at or after `from` allowed by the prefilter.
    fn next_candidate(&self, subject: &Subject<'_>, from: usize) -> Option<usize> {
        match self.prefilter {
            Some(unit) => subject.find_unit(from, unit),
            None => Some(from),
        }
    }

    // ---- Backtrack stack ----

    fn push_regexp_state(&mut self, state: RegExpState) -> Result<(), RegExpError> {
        let len = self.state_stack.len();
        let limit = self.limits.match_stack_limit as usize;
        if limit != 0 && len >= limit {
            return Err(RegExpError::MatchStackLimitOver);
        }
        if len + 1 > self.state_stack_size {
            self.realloc_stack(len + 1)?;
        }
        self.state_stack.push(state);
        Ok(())
    }

    /// Pop the top entry and undo its side effect.
    fn pop_regexp_state(&mut self) -> Option<RegExpState> {
        let state = self.state_stack.pop()?;
        match state {
            RegExpState::Save { index, is_end, prev } => {
                let slot = &mut self.capture_result_list[index as usize];
                if is_end {
                    slot.capture_end = prev;
                } else {
                    slot.capture_start = prev;
                }
            }
            RegExpState::Push => {
                self.stack.pop();
            }
            RegExpState::Pop { value } => self.stack.push(value),
            RegExpState::Set { value } => {
                if let Some(top) = self.stack.last_mut() {
                    *top = value;
                }
            }
            RegExpState::Split { .. }
            | RegExpState::MatchAhead { .. }
            | RegExpState::NegativeMatchAhead { .. } => {}
        }
        Some(state)
    }

    /// Double the backtrack stack capacity until it holds `requested` entries.
    fn realloc_stack(&mut self, requested: usize) -> Result<(), RegExpError> {
        let mut new_size = (self.state_stack_size * 2).max(MIN_STATE_STACK_SIZE);
        while new_size < requested {
            new_size *= 2;
        }
        let bytes = new_size
            .checked_mul(std::mem::size_of::<RegExpState>())
            .ok_or(RegExpError::StateStackOverflow)?;
        if bytes > MAX_STATE_STACK_BYTES {
            return Err(RegExpError::StateStackOverflow);
        }
        self.state_stack
            .try_reserve_exact(new_size - self.state_stack.len())?;
        trace!("state stack: {} -> {} entries", self.state_stack_size, new_size);
        self.state_stack_size = new_size;
        Ok(())
    }

    // ---- Auxiliary stack ----

    fn push_stack(&mut self, pc: usize, value: usize) -> Result<(), RegExpError> {
        if self.stack.len() >= self.n_stack as usize {
            return Err(RegExpError::StackSlotOverflow { pc });
        }
        self.push_regexp_state(RegExpState::Push)?;
        self.stack.push(value);
        Ok(())
    }

    fn pop_stack(&mut self, pc: usize) -> Result<usize, RegExpError> {
        let value = self.peek_stack(pc)?;
        self.push_regexp_state(RegExpState::Pop { value })?;
        self.stack.pop();
        Ok(value)
    }

    fn peek_stack(&self, pc: usize) -> Result<usize, RegExpError> {
        self.stack
            .last()
            .copied()
            .ok_or(RegExpError::StackUnderflow { pc })
    }

    fn set_stack_value(&mut self, pc: usize, value: usize) -> Result<(), RegExpError> {
        let prev = self.peek_stack(pc)?;
        self.push_regexp_state(RegExpState::Set { value: prev })?;
        if let Some(top) = self.stack.last_mut() {
            *top = value;
        }
        Ok(())
    }

    // ---- Results ----

    /// Write the capture offsets of the last match into `region`. Groups that
    /// did not participate are stored as `(0, -1)`.
    pub fn get_result(&self, region: &mut MatchRegion) {
        region.resize(self.n_capture as usize);
        for (i, capture) in self.capture_result_list.iter().enumerate() {
            match capture.range() {
                Some((start, end)) => region.set(i, to_region_offset(start), to_region_offset(end)),
                None => region.set(i, REGION_UNDEFINED_START, REGION_UNDEFINED_END),
            }
        }
    }

    /// Print every capture of the last match as text, one per line.
    pub fn dump_result<W: io::Write>(&self, out: &mut W, subject: &Subject<'_>) -> io::Result<()> {
        writeln!(out, "captures:")?;
        for (i, capture) in self.capture_result_list.iter().enumerate() {
            match capture.range() {
                Some((start, end)) => {
                    writeln!(out, "{}:{}", i, subject.to_string_lossy(start, end))?
                }
                None => writeln!(out, "{}:undefined", i)?,
            }
        }
        Ok(())
    }
}

#[inline]
fn to_region_offset(pos: usize) -> i32 {
    i32::try_from(pos).unwrap_or(i32::MAX)
}

/// Membership test for `OP_RANGE`, `OP_RANGE32` and `OP_SPARSE`. Entries are
/// sorted, so this is a binary search over `(low, high)` pairs.
fn class_contains(program: &Program<'_>, pc: usize, op: OpCode, c: u32) -> Result<bool, RegExpError> {
    let count = program.read_u16(pc + 1)? as usize;
    let base = pc + 1 + RANGE_COUNT_SIZE;
    let entry = |i: usize| -> Result<(u32, u32), RegExpError> {
        match op {
            OpCode::Range => {
                let at = base + i * RANGE16_ENTRY_SIZE;
                Ok((program.read_u16(at)? as u32, program.read_u16(at + 2)? as u32))
            }
            OpCode::Range32 => {
                let at = base + i * RANGE32_ENTRY_SIZE;
                Ok((program.read_u32(at)?, program.read_u32(at + 4)?))
            }
            _ => {
                let v = program.read_u32(base + i * SPARSE_ENTRY_SIZE)?;
                Ok((v, v))
            }
        }
    };

    let mut low = 0;
    let mut high = count;
    while low < high {
        let mid = (low + high) >> 1;
        let (_, range_high) = entry(mid)?;
        if c > range_high {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    if low < count {
        let (range_low, _) = entry(low)?;
        Ok(c >= range_low)
    } else {
        Ok(false)
    }
}

// ============================================================================
// Tests
// ============================================================================
