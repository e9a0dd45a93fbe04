// subject.rs - Input text seen by the executor.
//
// Positions are code-unit indices; the character width only matters when
// the host hands over raw bytes. All reads are bounds-checked.

use crate::error::RegExpError;

const LINE_FEED: u32 = 0x000a;
const CARRIAGE_RETURN: u32 = 0x000d;
const LINE_SEPARATOR: u32 = 0x2028;
const PARAGRAPH_SEPARATOR: u32 = 0x2029;

const HIGH_SURROGATE_START: u32 = 0xd800;
const HIGH_SURROGATE_END: u32 = 0xdbff;
const LOW_SURROGATE_START: u32 = 0xdc00;
const LOW_SURROGATE_END: u32 = 0xdfff;
const SURROGATE_BASE: u32 = 0x10000;

/// Input text, one or two bytes per code unit.
#[derive(Clone, Copy, Debug)]
pub enum Subject<'a> {
    /// One byte per character.
    Latin1(&'a [u8]),
    /// UTF-16 code units.
    Utf16(&'a [u16]),
    /// UTF-16 code units stored as native-endian byte pairs.
    Utf16Bytes(&'a [u8]),
}

impl<'a> Subject<'a> {
    /// Wrap a raw host buffer of `length` characters, each one or two bytes
    /// wide. Bytes past `length` characters are ignored.
    pub fn from_raw(input: &'a [u8], length: usize, is_wide_char: bool) -> Result<Self, RegExpError> {
        let width = if is_wide_char { 2 } else { 1 };
        let needed = length
            .checked_mul(width)
            .ok_or(RegExpError::InputTooShort { needed: usize::MAX, actual: input.len() })?;
        if input.len() < needed {
            return Err(RegExpError::InputTooShort {
                needed,
                actual: input.len(),
            });
        }
        let data = &input[..needed];
        Ok(if is_wide_char {
            Subject::Utf16Bytes(data)
        } else {
            Subject::Latin1(data)
        })
    }

    /// Number of code units.
    pub fn len(&self) -> usize {
        match self {
            Subject::Latin1(b) => b.len(),
            Subject::Utf16(u) => u.len(),
            Subject::Utf16Bytes(b) => b.len() / 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_wide_char(&self) -> bool {
        !matches!(self, Subject::Latin1(_))
    }

    /// Bytes per code unit.
    pub fn char_width(&self) -> usize {
        if self.is_wide_char() {
            2
        } else {
            1
        }
    }

    /// Code unit at `index`, or `None` past the end.
    #[inline]
    pub fn unit(&self, index: usize) -> Option<u32> {
        match self {
            Subject::Latin1(b) => b.get(index).map(|&c| c as u32),
            Subject::Utf16(u) => u.get(index).map(|&c| c as u32),
            Subject::Utf16Bytes(b) => {
                let at = index.checked_mul(2)?;
                let pair = b.get(at..at + 2)?;
                Some(u16::from_ne_bytes([pair[0], pair[1]]) as u32)
            }
        }
    }

    /// Character starting at `index` and its width in code units. In unicode
    /// mode a valid surrogate pair reads as one code point.
    #[inline]
    pub fn char_at(&self, index: usize, unicode: bool) -> Option<(u32, usize)> {
        let c = self.unit(index)?;
        if unicode && self.is_wide_char() && is_high_surrogate(c) {
            if let Some(low) = self.unit(index + 1).filter(|&u| is_low_surrogate(u)) {
                return Some((decode_surrogates(c, low), 2));
            }
        }
        Some((c, 1))
    }

    /// Character ending just before `index` and its width in code units.
    #[inline]
    pub fn char_before(&self, index: usize, unicode: bool) -> Option<(u32, usize)> {
        let c = self.unit(index.checked_sub(1)?)?;
        if unicode && self.is_wide_char() && is_low_surrogate(c) && index >= 2 {
            if let Some(high) = self.unit(index - 2).filter(|&u| is_high_surrogate(u)) {
                return Some((decode_surrogates(high, c), 2));
            }
        }
        Some((c, 1))
    }

    /// Index one character past `index` (AdvanceStringIndex).
    pub fn advance_index(&self, index: usize, unicode: bool) -> usize {
        match self.char_at(index, unicode) {
            Some((_, width)) => index + width,
            None => index + 1,
        }
    }

    /// First index at or after `from` holding `unit`.
    pub fn find_unit(&self, from: usize, unit: u32) -> Option<usize> {
        if from >= self.len() {
            return None;
        }
        match self {
            Subject::Latin1(b) => {
                let byte = u8::try_from(unit).ok()?;
                memchr::memchr(byte, &b[from..]).map(|i| from + i)
            }
            Subject::Utf16(u) => u[from..]
                .iter()
                .position(|&c| c as u32 == unit)
                .map(|i| from + i),
            Subject::Utf16Bytes(_) => (from..self.len()).find(|&i| self.unit(i) == Some(unit)),
        }
    }

    /// Render `start..end` as text for diagnostics.
    pub fn to_string_lossy(&self, start: usize, end: usize) -> String {
        let end = end.min(self.len());
        let start = start.min(end);
        match self {
            Subject::Latin1(b) => b[start..end].iter().map(|&c| c as char).collect(),
            Subject::Utf16(u) => String::from_utf16_lossy(&u[start..end]),
            Subject::Utf16Bytes(_) => {
                let units: Vec<u16> = (start..end)
                    .filter_map(|i| self.unit(i))
                    .map(|c| c as u16)
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }
}

#[inline]
pub fn is_high_surrogate(c: u32) -> bool {
    (HIGH_SURROGATE_START..=HIGH_SURROGATE_END).contains(&c)
}

#[inline]
pub fn is_low_surrogate(c: u32) -> bool {
    (LOW_SURROGATE_START..=LOW_SURROGATE_END).contains(&c)
}

#[inline]
fn decode_surrogates(high: u32, low: u32) -> u32 {
    ((high - HIGH_SURROGATE_START) << 10) + (low - LOW_SURROGATE_START) + SURROGATE_BASE
}

#[inline]
pub fn is_line_terminator(c: u32) -> bool {
    matches!(c, LINE_FEED | CARRIAGE_RETURN | LINE_SEPARATOR | PARAGRAPH_SEPARATOR)
}

#[inline]
pub fn is_word_char(c: u32) -> bool {
    u8::try_from(c).is_ok_and(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Ignore-case canonical form of a character.
///
/// Non-unicode mode uppercases, keeping the character when the mapping is
/// not a single character or would move a non-ASCII character into ASCII.
/// Unicode mode applies simple lowercase folding.
pub fn canonicalize(c: u32, unicode: bool) -> u32 {
    if c < 0x80 {
        let b = c as u8;
        return if unicode {
            b.to_ascii_lowercase() as u32
        } else {
            b.to_ascii_uppercase() as u32
        };
    }
    let Some(ch) = char::from_u32(c) else {
        return c;
    };
    if !unicode {
        return single_upper(ch).unwrap_or(c);
    }
    simple_fold(ch)
}

/// Simple case folding: uppercase then lowercase, each only when it maps to a
/// single char. U+0131 folds only under Turkic rules.
fn simple_fold(ch: char) -> u32 {
    if ch == '\u{131}' {
        return ch as u32;
    }
    let upper = single_char(ch.to_uppercase()).unwrap_or(ch);
    single_char(upper.to_lowercase()).unwrap_or(ch) as u32
}

fn single_char(mut mapped: impl Iterator<Item = char>) -> Option<char> {
    match (mapped.next(), mapped.next()) {
        (Some(m), None) => Some(m),
        _ => None,
    }
}

fn single_upper(ch: char) -> Option<u32> {
    let u = single_char(ch.to_uppercase())?;
    if (u as u32) < 0x80 {
        return None;
    }
    Some(u as u32)
}
