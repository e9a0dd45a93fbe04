// region.rs - Capture result sink filled by `RegExpExecutor::get_result`.
//
// Offsets are character indices. A group that did not participate holds the
// sentinel pair (REGION_UNDEFINED_START, REGION_UNDEFINED_END).

use std::ops::Range;

use smallvec::SmallVec;

pub const REGION_UNDEFINED_START: i32 = 0;
pub const REGION_UNDEFINED_END: i32 = -1;

/// Inline capacity before the offset arrays spill to the heap.
const INLINE_REGS: usize = 8;

/// Start/end offsets for every capture group of the last match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchRegion {
    pub allocated: usize,
    pub num_regs: usize,
    pub beg: SmallVec<[i32; INLINE_REGS]>,
    pub end: SmallVec<[i32; INLINE_REGS]>,
}

impl MatchRegion {
    pub fn new() -> Self {
        MatchRegion {
            allocated: INLINE_REGS,
            num_regs: 0,
            beg: SmallVec::new(),
            end: SmallVec::new(),
        }
    }

    /// Set the register count to `n`, growing capacity only when `n`
    /// exceeds what is allocated. Every register starts undefined.
    pub fn resize(&mut self, n: usize) {
        if n > self.allocated {
            self.beg.reserve(n - self.beg.len());
            self.end.reserve(n - self.end.len());
            self.allocated = n;
        }
        self.beg.clear();
        self.end.clear();
        self.beg.resize(n, REGION_UNDEFINED_START);
        self.end.resize(n, REGION_UNDEFINED_END);
        self.num_regs = n;
    }

    pub fn clear(&mut self) {
        for i in 0..self.num_regs {
            self.beg[i] = REGION_UNDEFINED_START;
            self.end[i] = REGION_UNDEFINED_END;
        }
    }

    pub fn set(&mut self, i: usize, beg: i32, end: i32) {
        self.beg[i] = beg;
        self.end[i] = end;
    }

    pub fn len(&self) -> usize {
        self.num_regs
    }

    pub fn is_empty(&self) -> bool {
        self.num_regs == 0
    }

    pub fn is_defined(&self, i: usize) -> bool {
        i < self.num_regs && self.end[i] >= self.beg[i] && self.end[i] != REGION_UNDEFINED_END
    }

    /// Character range of group `i`, or `None` if it did not participate.
    pub fn get(&self, i: usize) -> Option<Range<usize>> {
        if !self.is_defined(i) {
            return None;
        }
        Some(self.beg[i] as usize..self.end[i] as usize)
    }
}
