// prelude.rs - Convenient re-exports for the host-facing API.
//
//! # Prelude
//!
//! ```
//! use regexp_vm::prelude::*;
//!
//! let mut b = ProgramBuilder::new();
//! b.group(0, |b| {
//!     b.literal("42");
//! });
//! b.match_end();
//! let mut re = RegExp::new(b.finish()).unwrap();
//! let caps = re.exec(Subject::Latin1(b"answer: 42")).unwrap().unwrap();
//! assert_eq!(caps.get(0).unwrap().as_string(), "42");
//! ```

pub use crate::api::{Captures, CapturesIter, Match, RegExp};
pub use crate::builder::ProgramBuilder;
pub use crate::error::RegExpError;
pub use crate::executor::{ExecLimits, RegExpExecutor};
pub use crate::program::RegExpFlags;
pub use crate::region::MatchRegion;
pub use crate::subject::Subject;
