// executor_test.rs - Integration tests for RegExpExecutor over assembled programs.

use regexp_vm::builder::ProgramBuilder;
use regexp_vm::error::RegExpError;
use regexp_vm::executor::{ExecLimits, RegExpExecutor};
use regexp_vm::opcode::INFINITE_REPEAT;
use regexp_vm::program::{RegExpFlags, NUM_CAPTURE_OFFSET, NUM_STACK_OFFSET, OCTETS_SIZE_OFFSET};
use regexp_vm::region::MatchRegion;
use regexp_vm::subject::Subject;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Groups = Vec<Option<(usize, usize)>>;

fn groups(region: &MatchRegion) -> Groups {
    (0..region.len())
        .map(|i| region.get(i).map(|r| (r.start, r.end)))
        .collect()
}

fn run_with(
    executor: &mut RegExpExecutor,
    program: &[u8],
    input: &[u8],
    length: usize,
    last_index: u32,
    wide: bool,
) -> Result<Option<Groups>, RegExpError> {
    if !executor.execute(input, last_index, length as u32, program, wide)? {
        return Ok(None);
    }
    let mut region = MatchRegion::new();
    executor.get_result(&mut region);
    Ok(Some(groups(&region)))
}

fn run(program: &[u8], text: &str, last_index: u32) -> Result<Option<Groups>, RegExpError> {
    let mut executor = RegExpExecutor::with_limits(ExecLimits::unlimited());
    run_with(&mut executor, program, text.as_bytes(), text.len(), last_index, false)
}

fn wide_bytes(text: &str) -> (Vec<u8>, usize) {
    let units: Vec<u16> = text.encode_utf16().collect();
    let bytes = units.iter().flat_map(|u| u.to_ne_bytes()).collect();
    (bytes, units.len())
}

fn run_wide(program: &[u8], text: &str, last_index: u32) -> Result<Option<Groups>, RegExpError> {
    let (bytes, len) = wide_bytes(text);
    let mut executor = RegExpExecutor::with_limits(ExecLimits::unlimited());
    run_with(&mut executor, program, &bytes, len, last_index, true)
}

fn whole(text: &str, program: &[u8]) -> Option<(usize, usize)> {
    run(program, text, 0).unwrap().and_then(|g| g[0])
}

/// `group 0 { body }; MATCH_END` with the given flags.
fn program<F: FnOnce(&mut ProgramBuilder)>(flags: RegExpFlags, body: F) -> Vec<u8> {
    let mut b = ProgramBuilder::new();
    b.set_flags(flags);
    b.group(0, body);
    b.match_end();
    b.finish()
}

fn literal(s: &str) -> Vec<u8> {
    program(RegExpFlags::empty(), |b| {
        b.literal(s);
    })
}

fn set_header_field(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

// ---------------------------------------------------------------------------
// Literals and start positions
// ---------------------------------------------------------------------------

#[test]
fn literal_search_finds_first_occurrence() {
    let p = literal("ab");
    assert_eq!(whole("xaby", &p), Some((1, 3)));
    assert_eq!(whole("abab", &p), Some((0, 2)));
}

#[test]
fn literal_search_without_occurrence() {
    assert_eq!(run(&literal("ab"), "xyz", 0).unwrap(), None);
}

#[test]
fn search_starts_at_last_index() {
    assert_eq!(run(&literal("ab"), "abab", 1).unwrap().unwrap()[0], Some((2, 4)));
    assert_eq!(run(&literal("ab"), "abab", 3).unwrap(), None);
}

#[test]
fn single_capture_slot_around_second_char() {
    let mut b = ProgramBuilder::new();
    b.literal("a");
    b.group(0, |b| {
        b.literal("b");
    });
    b.match_end();
    let p = b.finish();
    assert_eq!(run(&p, "ab", 0).unwrap(), Some(vec![Some((1, 2))]));
}

#[test]
fn whole_match_and_inner_group() {
    let p = program(RegExpFlags::empty(), |b| {
        b.literal("a");
        b.group(1, |b| {
            b.literal("b");
        });
    });
    assert_eq!(run(&p, "ab", 0).unwrap(), Some(vec![Some((0, 2)), Some((1, 2))]));
}

#[test]
fn sticky_does_not_advance() {
    let p = program(RegExpFlags::STICKY, |b| {
        b.literal("a");
    });
    assert_eq!(run(&p, "ba", 0).unwrap(), None);
    assert_eq!(run(&p, "ba", 1).unwrap().unwrap()[0], Some((1, 2)));
}

#[test]
fn empty_subject() {
    let empty = program(RegExpFlags::empty(), |_| {});
    assert_eq!(whole("", &empty), Some((0, 0)));
    assert_eq!(run(&literal("a"), "", 0).unwrap(), None);
}

#[test]
fn match_without_groups_reports_no_captures() {
    let mut b = ProgramBuilder::new();
    b.literal("ab");
    b.match_end();
    assert_eq!(run(&b.finish(), "xab", 0).unwrap(), Some(vec![]));
}

#[test]
fn program_without_match_end_fails() {
    let mut b = ProgramBuilder::new();
    b.literal("a");
    assert_eq!(run(&b.finish(), "a", 0).unwrap(), None);
}

// ---------------------------------------------------------------------------
// UTF-16 input
// ---------------------------------------------------------------------------

#[test]
fn wide_input_with_surrogate_pair() {
    let p = program(RegExpFlags::UTF16, |b| {
        b.literal("a");
    });
    assert_eq!(run_wide(&p, "x\u{1f600}a", 0).unwrap().unwrap()[0], Some((3, 4)));
}

#[test]
fn retry_skips_whole_surrogate_pair_in_unicode_mode() {
    let unicode = program(RegExpFlags::UTF16, |b| {
        b.char(0xde00);
    });
    assert_eq!(run_wide(&unicode, "\u{1f600}", 0).unwrap(), None);

    let plain = program(RegExpFlags::empty(), |b| {
        b.char(0xde00);
    });
    assert_eq!(run_wide(&plain, "\u{1f600}", 0).unwrap().unwrap()[0], Some((1, 2)));
}

#[test]
fn dot_consumes_surrogate_pair_in_unicode_mode() {
    let unicode = program(RegExpFlags::UTF16 | RegExpFlags::STICKY, |b| {
        b.dots();
    });
    assert_eq!(run_wide(&unicode, "x\u{1f600}", 1).unwrap().unwrap()[0], Some((1, 3)));

    let plain = program(RegExpFlags::STICKY, |b| {
        b.dots();
    });
    assert_eq!(run_wide(&plain, "x\u{1f600}", 1).unwrap().unwrap()[0], Some((1, 2)));
}

#[test]
fn astral_char_literal() {
    let p = program(RegExpFlags::UTF16, |b| {
        b.literal("\u{1f600}!");
    });
    assert_eq!(run_wide(&p, "ab\u{1f600}!", 0).unwrap().unwrap()[0], Some((2, 5)));
}

#[test]
fn astral_literal_as_surrogate_units() {
    let p = literal("\u{1f600}");
    assert_eq!(run_wide(&p, "a\u{1f600}", 0).unwrap().unwrap()[0], Some((1, 3)));
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

#[test]
fn nested_empty_loops_terminate() {
    let p = program(RegExpFlags::empty(), |b| {
        b.quantifier(0, INFINITE_REPEAT, true, true, |b| {
            b.group(1, |b| {
                b.quantifier(0, INFINITE_REPEAT, true, true, |b| {
                    b.literal("a");
                });
            });
        });
    });
    let groups = run(&p, "b", 0).unwrap().unwrap();
    assert_eq!(groups[0], Some((0, 0)));
}

#[test]
fn nested_loops_consume_input() {
    let p = program(RegExpFlags::empty(), |b| {
        b.quantifier(0, INFINITE_REPEAT, true, true, |b| {
            b.group(1, |b| {
                b.quantifier(1, INFINITE_REPEAT, true, false, |b| {
                    b.literal("a");
                });
            });
            b.literal(",");
        });
    });
    let groups = run(&p, "aa,a,b", 0).unwrap().unwrap();
    assert_eq!(groups, vec![Some((0, 5)), Some((3, 4))]);
}

#[test]
fn greedy_bounded_loop_takes_max() {
    let p = program(RegExpFlags::empty(), |b| {
        b.quantifier(2, 3, true, false, |b| {
            b.literal("a");
        });
    });
    assert_eq!(whole("aaaa", &p), Some((0, 3)));
    assert_eq!(whole("xaay", &p), Some((1, 3)));
    assert_eq!(whole("a", &p), None);
}

#[test]
fn lazy_bounded_loop_takes_min() {
    let p = program(RegExpFlags::empty(), |b| {
        b.quantifier(2, 3, false, false, |b| {
            b.literal("a");
        });
    });
    assert_eq!(whole("aaaa", &p), Some((0, 2)));
}

#[test]
fn lazy_loop_extends_on_failure() {
    let p = program(RegExpFlags::empty(), |b| {
        b.quantifier(1, 3, false, false, |b| {
            b.literal("a");
        });
        b.literal("b");
    });
    assert_eq!(whole("aaab", &p), Some((0, 4)));
    assert_eq!(whole("aaaab", &p), Some((1, 5)));
}

#[test]
fn greedy_star_backtracks() {
    let p = program(RegExpFlags::empty(), |b| {
        b.quantifier(0, INFINITE_REPEAT, true, false, |b| {
            b.dots();
        });
        b.literal("b");
    });
    assert_eq!(whole("abcb", &p), Some((0, 4)));
    assert_eq!(whole("xyz", &p), None);
}

#[test]
fn star_matches_empty_at_first_position() {
    let p = program(RegExpFlags::empty(), |b| {
        b.quantifier(0, INFINITE_REPEAT, true, false, |b| {
            b.literal("a");
        });
    });
    assert_eq!(whole("baa", &p), Some((0, 0)));
}

#[test]
fn long_input_grows_state_stack() {
    let p = program(RegExpFlags::empty(), |b| {
        b.quantifier(0, INFINITE_REPEAT, true, false, |b| {
            b.literal("a");
        });
    });
    let text = "a".repeat(10_000);
    let mut executor = RegExpExecutor::with_limits(ExecLimits::unlimited());
    let groups = run_with(&mut executor, &p, text.as_bytes(), text.len(), 0, false)
        .unwrap()
        .unwrap();
    assert_eq!(groups[0], Some((0, 10_000)));
    assert!(executor.state_stack_capacity() >= 10_000);
    assert_eq!(executor.state_stack_len(), 0);
}

// ---------------------------------------------------------------------------
// Alternation and lookahead
// ---------------------------------------------------------------------------

#[test]
fn alternation_tries_left_first() {
    let p = program(RegExpFlags::empty(), |b| {
        b.alternate(
            |b| {
                b.literal("ab");
            },
            |b| {
                b.literal("a");
            },
        );
    });
    assert_eq!(whole("ab", &p), Some((0, 2)));
    assert_eq!(whole("ac", &p), Some((0, 1)));
}

#[test]
fn negative_lookahead() {
    let p = program(RegExpFlags::empty(), |b| {
        b.literal("a");
        b.lookahead(true, |b| {
            b.literal("b");
        });
    });
    assert_eq!(whole("ab", &p), None);
    assert_eq!(whole("ac", &p), Some((0, 1)));
    assert_eq!(whole("abac", &p), Some((2, 3)));
}

#[test]
fn positive_lookahead_is_zero_width() {
    let p = program(RegExpFlags::empty(), |b| {
        b.lookahead(false, |b| {
            b.group(1, |b| {
                b.literal("ab");
            });
        });
        b.literal("a");
    });
    let groups = run(&p, "xab", 0).unwrap().unwrap();
    assert_eq!(groups, vec![Some((1, 2)), Some((1, 3))]);
}

#[test]
fn lookahead_captures_are_undone_on_backtrack() {
    let p = program(RegExpFlags::empty(), |b| {
        b.alternate(
            |b| {
                b.lookahead(false, |b| {
                    b.group(1, |b| {
                        b.literal("a");
                    });
                });
                b.literal("ab");
            },
            |b| {
                b.literal("ac");
            },
        );
    });
    let groups = run(&p, "ac", 0).unwrap().unwrap();
    assert_eq!(groups, vec![Some((0, 2)), None]);
}

#[test]
fn lookahead_does_not_backtrack_into_body() {
    // (?=(a+))a*b\1 on "baaabac": once the assertion holds its body is not
    // retried with a shorter run, so starts 1 and 2 fail.
    let p = program(RegExpFlags::empty(), |b| {
        b.lookahead(false, |b| {
            b.group(1, |b| {
                b.quantifier(1, INFINITE_REPEAT, true, false, |b| {
                    b.literal("a");
                });
            });
        });
        b.quantifier(0, INFINITE_REPEAT, true, false, |b| {
            b.literal("a");
        });
        b.literal("b");
        b.back_reference(1);
    });
    let groups = run(&p, "baaabac", 0).unwrap().unwrap();
    assert_eq!(groups, vec![Some((3, 6)), Some((3, 4))]);
}

// ---------------------------------------------------------------------------
// Captures and backreferences
// ---------------------------------------------------------------------------

#[test]
fn backreference_repeats_capture() {
    let p = program(RegExpFlags::empty(), |b| {
        b.group(1, |b| {
            b.literal("a");
            b.quantifier(0, INFINITE_REPEAT, true, false, |b| {
                b.literal("b");
            });
        });
        b.back_reference(1);
    });
    let groups = run(&p, "abbabb", 0).unwrap().unwrap();
    assert_eq!(groups, vec![Some((0, 6)), Some((0, 3))]);
}

#[test]
fn undefined_backreference_matches_empty() {
    let p = program(RegExpFlags::empty(), |b| {
        b.back_reference(1);
        b.literal("a");
    });
    let groups = run(&p, "a", 0).unwrap().unwrap();
    assert_eq!(groups, vec![Some((0, 1)), None]);
}

#[test]
fn backreference_ignore_case() {
    let p = program(RegExpFlags::IGNORECASE, |b| {
        b.group(1, |b| {
            b.literal("a");
        });
        b.back_reference(1);
    });
    assert_eq!(whole("aA", &p), Some((0, 2)));

    let strict = program(RegExpFlags::empty(), |b| {
        b.group(1, |b| {
            b.literal("a");
        });
        b.back_reference(1);
    });
    assert_eq!(whole("aA", &strict), None);
}

#[test]
fn backward_backreference_moves_left() {
    let p = program(RegExpFlags::STICKY, |b| {
        b.group(1, |b| {
            b.literal("ab");
        });
        b.backward_back_reference(1);
        b.literal("ab");
    });
    assert_eq!(run(&p, "ab", 0).unwrap().unwrap()[1], Some((0, 2)));

    let too_far = program(RegExpFlags::empty(), |b| {
        b.group(1, |b| {
            b.literal("ab");
        });
        b.backward_back_reference(1);
        b.backward_back_reference(1);
    });
    assert_eq!(run(&too_far, "ab", 0).unwrap(), None);
}

#[test]
fn save_reset_clears_groups() {
    let p = program(RegExpFlags::empty(), |b| {
        b.group(1, |b| {
            b.literal("a");
        });
        b.save_reset(1, 1);
        b.literal("b");
    });
    let groups = run(&p, "ab", 0).unwrap().unwrap();
    assert_eq!(groups, vec![Some((0, 2)), None]);
}

#[test]
fn prev_steps_back_one_char() {
    let p = program(RegExpFlags::empty(), |b| {
        b.literal("ab");
        b.prev();
        b.literal("b");
    });
    assert_eq!(whole("ab", &p), Some((0, 2)));

    let at_start = program(RegExpFlags::STICKY, |b| {
        b.prev();
    });
    assert_eq!(run(&at_start, "ab", 0).unwrap(), None);
}

// ---------------------------------------------------------------------------
// Character classes and case folding
// ---------------------------------------------------------------------------

#[test]
fn range_class() {
    let p = program(RegExpFlags::empty(), |b| {
        b.quantifier(1, INFINITE_REPEAT, true, false, |b| {
            b.range(&[(0x30, 0x39)]);
        });
    });
    assert_eq!(whole("ab123c", &p), Some((2, 5)));
}

#[test]
fn range32_class_on_astral_chars() {
    let p = program(RegExpFlags::UTF16, |b| {
        b.range32(&[(0x1f600, 0x1f64f)]);
    });
    assert_eq!(run_wide(&p, "x\u{1f600}", 0).unwrap().unwrap()[0], Some((1, 3)));
    assert_eq!(run_wide(&p, "x\u{1f680}", 0).unwrap(), None);
}

#[test]
fn sparse_set() {
    let p = program(RegExpFlags::empty(), |b| {
        b.sparse(&['z' as u32, 'x' as u32]);
    });
    assert_eq!(whole("abz", &p), Some((2, 3)));
    assert_eq!(whole("aby", &p), None);
}

#[test]
fn dots_exclude_line_terminators() {
    let dots = program(RegExpFlags::empty(), |b| {
        b.dots();
    });
    let all = program(RegExpFlags::DOTALL, |b| {
        b.all();
    });
    assert_eq!(whole("\n", &dots), None);
    assert_eq!(whole("\r", &dots), None);
    assert_eq!(whole("\n", &all), Some((0, 1)));
}

#[test]
fn ignore_case_literal() {
    let p = program(RegExpFlags::IGNORECASE, |b| {
        b.literal("abc");
    });
    assert_eq!(whole("xABC", &p), Some((1, 4)));
    assert_eq!(whole("xABD", &p), None);
}

#[test]
fn ignore_case_unicode_folding() {
    let p = program(RegExpFlags::IGNORECASE | RegExpFlags::UTF16, |b| {
        b.literal("\u{e9}");
    });
    assert_eq!(run_wide(&p, "\u{c9}", 0).unwrap().unwrap()[0], Some((0, 1)));

    // chars whose fold goes through their uppercase form
    for (pattern, text) in [("s", "\u{17f}"), ("\u{3c3}", "\u{3c2}"), ("\u{1e61}", "\u{1e9b}")] {
        let p = program(RegExpFlags::IGNORECASE | RegExpFlags::UTF16, |b| {
            b.literal(pattern);
        });
        assert_eq!(run_wide(&p, text, 0).unwrap().unwrap()[0], Some((0, 1)), "{:?}", text);
    }
}

#[test]
fn ignore_case_without_unicode_keeps_long_s() {
    let p = program(RegExpFlags::IGNORECASE, |b| {
        b.literal("s");
    });
    assert_eq!(run_wide(&p, "\u{17f}", 0).unwrap(), None);
}

// ---------------------------------------------------------------------------
// Anchors
// ---------------------------------------------------------------------------

#[test]
fn line_start_respects_multiline() {
    let single = program(RegExpFlags::empty(), |b| {
        b.line_start();
        b.literal("b");
    });
    let multi = program(RegExpFlags::MULTILINE, |b| {
        b.line_start();
        b.literal("b");
    });
    assert_eq!(whole("a\nb", &single), None);
    assert_eq!(whole("a\nb", &multi), Some((2, 3)));
}

#[test]
fn line_end_respects_multiline() {
    let single = program(RegExpFlags::empty(), |b| {
        b.literal("a");
        b.line_end();
    });
    let multi = program(RegExpFlags::MULTILINE, |b| {
        b.literal("a");
        b.line_end();
    });
    assert_eq!(whole("a\nb", &single), None);
    assert_eq!(whole("a\nb", &multi), Some((0, 1)));
    assert_eq!(whole("ba", &single), Some((1, 2)));
}

#[test]
fn word_boundaries() {
    let bounded = program(RegExpFlags::empty(), |b| {
        b.word_boundary();
        b.literal("cat");
        b.word_boundary();
    });
    assert_eq!(whole("concat cat", &bounded), Some((7, 10)));

    let inner = program(RegExpFlags::empty(), |b| {
        b.not_word_boundary();
        b.literal("cat");
    });
    assert_eq!(whole("cat concat", &inner), Some((7, 10)));
}

// ---------------------------------------------------------------------------
// Prefilter
// ---------------------------------------------------------------------------

#[test]
fn prefilter_skips_to_candidate() {
    let mut b = ProgramBuilder::new();
    b.set_prefilter('q' as u16);
    b.group(0, |b| {
        b.literal("qu");
    });
    b.match_end();
    let p = b.finish();
    assert_eq!(whole("aaaquit", &p), Some((3, 5)));
    assert_eq!(whole("qqu", &p), Some((1, 3)));
    assert_eq!(whole("aaaa", &p), None);
}

#[test]
fn prefilter_ignored_with_ignore_case() {
    let mut b = ProgramBuilder::new();
    b.set_flags(RegExpFlags::IGNORECASE);
    b.set_prefilter('q' as u16);
    b.group(0, |b| {
        b.literal("qu");
    });
    b.match_end();
    assert_eq!(whole("aQU", &b.finish()), Some((1, 3)));
}

// ---------------------------------------------------------------------------
// Executor reuse and diagnostics
// ---------------------------------------------------------------------------

#[test]
fn execute_is_idempotent() {
    let p = program(RegExpFlags::empty(), |b| {
        b.literal("a");
        b.group(1, |b| {
            b.quantifier(0, INFINITE_REPEAT, true, false, |b| {
                b.literal("b");
            });
        });
    });
    let mut executor = RegExpExecutor::with_limits(ExecLimits::unlimited());
    let first = run_with(&mut executor, &p, b"xabbc", 5, 0, false).unwrap();
    let second = run_with(&mut executor, &p, b"xabbc", 5, 0, false).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.unwrap(), vec![Some((1, 4)), Some((2, 4))]);
}

#[test]
fn executor_reuse_across_programs() {
    let mut executor = RegExpExecutor::with_limits(ExecLimits::unlimited());
    let three = program(RegExpFlags::empty(), |b| {
        b.group(1, |b| {
            b.literal("a");
        });
        b.group(2, |b| {
            b.literal("b");
        });
    });
    let one = literal("b");
    let g = run_with(&mut executor, &three, b"ab", 2, 0, false).unwrap().unwrap();
    assert_eq!(g.len(), 3);
    let g = run_with(&mut executor, &one, b"ab", 2, 0, false).unwrap().unwrap();
    assert_eq!(g, vec![Some((1, 2))]);
    assert_eq!(executor.capture_count(), 1);
}

#[test]
fn dump_result_prints_captures() {
    let p = program(RegExpFlags::empty(), |b| {
        b.literal("a");
        b.quantifier(0, 1, true, false, |b| {
            b.group(1, |b| {
                b.literal("z");
            });
        });
        b.literal("b");
    });
    let mut executor = RegExpExecutor::new();
    assert!(executor.execute(b"xaby", 0, 4, &p, false).unwrap());
    let mut out = Vec::new();
    executor
        .dump_result(&mut out, &Subject::Latin1(b"xaby"))
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "captures:\n0:ab\n1:undefined\n");
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn error_last_index_out_of_range() {
    let mut executor = RegExpExecutor::new();
    assert_eq!(
        executor.execute(b"ab", 3, 2, &literal("a"), false),
        Err(RegExpError::LastIndexOutOfRange { last_index: 3, length: 2 })
    );
}

#[test]
fn error_input_too_short() {
    let mut executor = RegExpExecutor::new();
    assert_eq!(
        executor.execute(b"ab", 0, 2, &literal("a"), true),
        Err(RegExpError::InputTooShort { needed: 4, actual: 2 })
    );
}

#[test]
fn error_undefined_bytecode() {
    let mut buf = ProgramBuilder::new().finish();
    buf.push(0xee);
    let size = buf.len() as u32;
    set_header_field(&mut buf, OCTETS_SIZE_OFFSET, size);
    assert_eq!(
        run(&buf, "a", 0),
        Err(RegExpError::UndefinedBytecode { pc: 20, opcode: 0xee })
    );
}

#[test]
fn error_truncated_operand() {
    let mut b = ProgramBuilder::new();
    b.char('a' as u32);
    let mut buf = b.finish();
    set_header_field(&mut buf, OCTETS_SIZE_OFFSET, 22);
    assert_eq!(run(&buf, "a", 0), Err(RegExpError::TruncatedInstruction { pc: 21 }));
}

#[test]
fn error_branch_out_of_range() {
    let mut b = ProgramBuilder::new();
    let goto = b.goto();
    b.patch(goto, 1000);
    b.match_end();
    assert_eq!(
        run(&b.finish(), "a", 0),
        Err(RegExpError::BranchOutOfRange { pc: 20, target: 1000 })
    );
}

#[test]
fn error_capture_out_of_range() {
    let mut b = ProgramBuilder::new();
    b.save_start(3);
    b.match_end();
    let mut buf = b.finish();
    set_header_field(&mut buf, NUM_CAPTURE_OFFSET, 1);
    assert_eq!(
        run(&buf, "a", 0),
        Err(RegExpError::CaptureOutOfRange { pc: 20, index: 3 })
    );
}

#[test]
fn error_stack_slot_overflow() {
    let mut b = ProgramBuilder::new();
    b.push();
    b.push();
    b.match_end();
    let mut buf = b.finish();
    set_header_field(&mut buf, NUM_STACK_OFFSET, 1);
    assert_eq!(run(&buf, "a", 0), Err(RegExpError::StackSlotOverflow { pc: 21 }));
}

#[test]
fn error_stack_underflow() {
    let mut b = ProgramBuilder::new();
    b.pop();
    b.match_end();
    assert_eq!(run(&b.finish(), "a", 0), Err(RegExpError::StackUnderflow { pc: 20 }));
}

#[test]
fn error_unbalanced_lookahead() {
    let mut b = ProgramBuilder::new();
    b.close_lookahead();
    b.match_end();
    assert_eq!(
        run(&b.finish(), "a", 0),
        Err(RegExpError::UnbalancedLookahead { pc: 20 })
    );
}

#[test]
fn error_malformed_header() {
    assert!(matches!(
        run(&[0u8; 10], "a", 0),
        Err(RegExpError::MalformedProgram { .. })
    ));
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

fn star_then_b() -> Vec<u8> {
    program(RegExpFlags::empty(), |b| {
        b.quantifier(0, INFINITE_REPEAT, true, false, |b| {
            b.literal("a");
        });
        b.literal("b");
    })
}

#[test]
fn retry_limit_stops_backtracking() {
    let text = "a".repeat(30);
    let mut executor = RegExpExecutor::with_limits(ExecLimits {
        match_stack_limit: 0,
        retry_limit_in_match: 100,
    });
    assert_eq!(
        run_with(&mut executor, &star_then_b(), text.as_bytes(), text.len(), 0, false),
        Err(RegExpError::RetryLimitInMatchOver)
    );

    let mut unlimited = RegExpExecutor::with_limits(ExecLimits::unlimited());
    assert_eq!(
        run_with(&mut unlimited, &star_then_b(), text.as_bytes(), text.len(), 0, false),
        Ok(None)
    );
}

#[test]
fn match_stack_limit_stops_growth() {
    let p = program(RegExpFlags::empty(), |b| {
        b.quantifier(0, INFINITE_REPEAT, true, false, |b| {
            b.literal("a");
        });
    });
    let text = "a".repeat(1000);
    let mut executor = RegExpExecutor::with_limits(ExecLimits {
        match_stack_limit: 100,
        retry_limit_in_match: 0,
    });
    let err = run_with(&mut executor, &p, text.as_bytes(), text.len(), 0, false).unwrap_err();
    assert_eq!(err, RegExpError::MatchStackLimitOver);
    assert!(err.is_resource_limit());
}
