// api.rs - Host-facing RegExp object over a compiled program.
//
// Wraps RegExpExecutor with the lastIndex bookkeeping of RegExp.prototype.exec
// and Rust-native result types: RegExp, Captures, CapturesIter, Match.

use std::io;
use std::ops::Range;

use crate::error::RegExpError;
use crate::executor::{ExecLimits, RegExpExecutor};
use crate::program::{Program, ProgramHeader, RegExpFlags};
use crate::region::MatchRegion;
use crate::subject::Subject;

/// A compiled program plus the state `exec` carries between calls.
///
/// # Examples
///
/// ```
/// use regexp_vm::api::RegExp;
/// use regexp_vm::builder::ProgramBuilder;
/// use regexp_vm::program::RegExpFlags;
/// use regexp_vm::subject::Subject;
///
/// let mut b = ProgramBuilder::new();
/// b.set_flags(RegExpFlags::GLOBAL);
/// b.group(0, |b| {
///     b.literal("ab");
/// });
/// b.match_end();
///
/// let mut re = RegExp::new(b.finish()).unwrap();
/// let text = Subject::Latin1(b"ab-ab");
/// assert_eq!(re.exec(text).unwrap().unwrap().get(0).unwrap().range(), 0..2);
/// assert_eq!(re.last_index(), 2);
/// assert_eq!(re.exec(text).unwrap().unwrap().get(0).unwrap().range(), 3..5);
/// assert!(re.exec(text).unwrap().is_none());
/// assert_eq!(re.last_index(), 0);
/// ```
pub struct RegExp {
    program: Vec<u8>,
    header: ProgramHeader,
    last_index: usize,
    executor: RegExpExecutor,
}

impl RegExp {
    /// Validate the header of `program` and take ownership of it.
    ///
    /// Group 0 must record the whole match: `exec` moves `last_index` to its
    /// end. A header declaring no capture groups is rejected.
    pub fn new(program: Vec<u8>) -> Result<RegExp, RegExpError> {
        Self::with_limits(program, ExecLimits::default())
    }

    pub fn with_limits(program: Vec<u8>, limits: ExecLimits) -> Result<RegExp, RegExpError> {
        let header = *Program::new(&program)?.header();
        if header.capture_count == 0 {
            return Err(RegExpError::MalformedProgram {
                message: "program records no group 0".to_string(),
            });
        }
        Ok(RegExp {
            program,
            header,
            last_index: 0,
            executor: RegExpExecutor::with_limits(limits),
        })
    }

    pub fn flags(&self) -> RegExpFlags {
        self.header.flags
    }

    pub fn program(&self) -> &[u8] {
        &self.program
    }

    pub fn last_index(&self) -> usize {
        self.last_index
    }

    pub fn set_last_index(&mut self, index: usize) {
        self.last_index = index;
    }

    /// Number of capture groups the program records (including group 0).
    pub fn captures_len(&self) -> usize {
        self.header.capture_count as usize
    }

    fn is_global_or_sticky(&self) -> bool {
        self.header
            .flags
            .intersects(RegExpFlags::GLOBAL | RegExpFlags::STICKY)
    }

    /// Run the program the way `RegExp.prototype.exec` does.
    ///
    /// `last_index` is only consulted and updated when the global or sticky
    /// flag is set: a failed match resets it to 0, a successful one moves it
    /// to the end of group 0.
    pub fn exec<'t>(&mut self, subject: Subject<'t>) -> Result<Option<Captures<'t>>, RegExpError> {
        let update = self.is_global_or_sticky();
        let start = if update { self.last_index } else { 0 };
        if start > subject.len() {
            if update {
                self.last_index = 0;
            }
            return Ok(None);
        }

        let captures = self.match_at(subject, start)?;
        if update {
            match captures.as_ref() {
                None => self.last_index = 0,
                Some(caps) => match caps.get(0) {
                    Some(m) => self.last_index = m.end(),
                    None => {
                        self.last_index = 0;
                        return Err(RegExpError::MalformedProgram {
                            message: "match left group 0 unset".to_string(),
                        });
                    }
                },
            }
        }
        Ok(captures)
    }

    /// Returns `true` if `exec` finds a match (with the same side effects).
    pub fn test(&mut self, subject: Subject<'_>) -> Result<bool, RegExpError> {
        Ok(self.exec(subject)?.is_some())
    }

    /// One executor run starting at `index`, leaving `last_index` untouched.
    pub fn match_at<'t>(
        &mut self,
        subject: Subject<'t>,
        index: usize,
    ) -> Result<Option<Captures<'t>>, RegExpError> {
        if !self.executor.execute_subject(subject, index, &self.program)? {
            return Ok(None);
        }
        let mut region = MatchRegion::new();
        self.executor.get_result(&mut region);
        Ok(Some(Captures { subject, region }))
    }

    /// Every successive match of group 0 from the start of `subject`. After
    /// an empty match the search resumes one character further.
    pub fn find_all<'t>(&mut self, subject: Subject<'t>) -> Result<Vec<Match<'t>>, RegExpError> {
        let unicode = self.header.flags.contains(RegExpFlags::UTF16);
        let mut matches = Vec::new();
        let mut index = 0;
        while index <= subject.len() {
            let Some(m) = self.match_at(subject, index)?.and_then(|caps| caps.get(0)) else {
                break;
            };
            index = if m.is_empty() {
                subject.advance_index(m.end(), unicode)
            } else {
                m.end()
            };
            matches.push(m);
        }
        Ok(matches)
    }

    /// Print the captures of the last successful run.
    pub fn dump_result<W: io::Write>(&self, out: &mut W, subject: &Subject<'_>) -> io::Result<()> {
        self.executor.dump_result(out, subject)
    }
}

impl std::fmt::Debug for RegExp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegExp")
            .field("flags", &self.header.flags)
            .field("captures", &self.header.capture_count)
            .field("last_index", &self.last_index)
            .finish()
    }
}

// === Match ===

/// One matched range of the subject, in character indices.
#[derive(Debug, Clone, Copy)]
pub struct Match<'t> {
    subject: Subject<'t>,
    start: usize,
    end: usize,
}

impl<'t> Match<'t> {
    pub fn start(&self) -> usize {
        self.start
    }

    /// End of the match (exclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The matched text, with unpaired surrogates replaced.
    pub fn as_string(&self) -> String {
        self.subject.to_string_lossy(self.start, self.end)
    }

    /// Length in characters (code units).
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// === Captures ===

/// All capture groups from a single match.
pub struct Captures<'t> {
    subject: Subject<'t>,
    region: MatchRegion,
}

impl<'t> Captures<'t> {
    /// Capture group `i`, or `None` if it did not participate.
    pub fn get(&self, i: usize) -> Option<Match<'t>> {
        let range = self.region.get(i)?;
        Some(Match {
            subject: self.subject,
            start: range.start,
            end: range.end,
        })
    }

    pub fn len(&self) -> usize {
        self.region.len()
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    pub fn region(&self) -> &MatchRegion {
        &self.region
    }

    pub fn iter(&self) -> CapturesIter<'_, 't> {
        CapturesIter {
            captures: self,
            index: 0,
        }
    }
}

impl std::fmt::Debug for Captures<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for m in self.iter() {
            list.entry(&m.map(|m| m.range()));
        }
        list.finish()
    }
}

// === CapturesIter ===

/// Iterator over capture groups in a [`Captures`].
pub struct CapturesIter<'c, 't> {
    captures: &'c Captures<'t>,
    index: usize,
}

impl<'t> Iterator for CapturesIter<'_, 't> {
    type Item = Option<Match<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.captures.len() {
            return None;
        }
        let m = self.captures.get(self.index);
        self.index += 1;
        Some(m)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.captures.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CapturesIter<'_, '_> {}
