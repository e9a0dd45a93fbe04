//! # regexp-vm
//!
//! Backtracking executor for compiled ECMAScript regular-expression bytecode,
//! matching Latin-1 or UTF-16 input. Scanning for a required first unit uses
//! [`memchr`](https://crates.io/crates/memchr).
//!
//! A program buffer is a 20-byte header followed by instructions (see
//! [`opcode`] and [`program`]). The upstream pattern compiler is not part of
//! this crate; [`builder::ProgramBuilder`] assembles programs by hand.
//!
//! ## Quick Start
//!
//! ```rust
//! use regexp_vm::prelude::*;
//!
//! let mut b = ProgramBuilder::new();
//! b.group(0, |b| {
//!     b.literal("a");
//!     b.group(1, |b| {
//!         b.literal("b");
//!     });
//! });
//! b.match_end();
//!
//! let mut re = RegExp::new(b.finish()).unwrap();
//! let caps = re.exec(Subject::Latin1(b"xaby")).unwrap().unwrap();
//! assert_eq!(caps.get(0).unwrap().range(), 1..3);
//! assert_eq!(caps.get(1).unwrap().range(), 2..3);
//! ```
//!
//! ## Low-Level Executor
//!
//! The host-side entry point takes a raw buffer, a start index, a length in
//! characters and the character width:
//!
//! ```rust
//! use regexp_vm::builder::ProgramBuilder;
//! use regexp_vm::executor::RegExpExecutor;
//! use regexp_vm::region::MatchRegion;
//!
//! let mut b = ProgramBuilder::new();
//! b.group(0, |b| {
//!     b.literal("ab");
//! });
//! b.match_end();
//! let program = b.finish();
//!
//! let mut executor = RegExpExecutor::new();
//! assert!(executor.execute(b"xaby", 0, 4, &program, false).unwrap());
//! let mut region = MatchRegion::new();
//! executor.get_result(&mut region);
//! assert_eq!(region.get(0), Some(1..3));
//! ```
//!
//! ## Module Structure
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`opcode`] | Instruction set and operand sizes |
//! | [`program`] | Header layout, flags, bounds-checked reads |
//! | [`subject`] | Input text and character classification |
//! | [`executor`] | Backtracking interpreter |
//! | [`region`] | Capture offsets of a match |
//! | [`builder`] | Program assembler |
//! | [`disasm`] | Program listing |
//! | [`api`] | `RegExp` with `lastIndex` semantics |
//! | [`error`] | Error type |

pub mod api;
pub mod builder;
pub mod disasm;
pub mod error;
pub mod executor;
pub mod opcode;
pub mod prelude;
pub mod program;
pub mod region;
pub mod subject;
