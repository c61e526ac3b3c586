// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Property tests over the invariants a compiled program must hold
//! regardless of source pattern or input: no leftover degenerate splits
//! after cleanup, agreement between `matches` and `match_index`, and
//! well-formed submatch ranges.

use quickcheck::{quickcheck, TestResult};
use threadre::{parse, Mode};

mod common;

/// A handful of patterns exercising alternation, repetition (bounded,
/// unbounded, and non-greedy), groups, classes, and anchors. Random byte
/// soup almost never parses as a regex, so patterns are drawn from this
/// fixed pool instead of generated from scratch.
const PATTERNS: &[&str] = &[
    "a", "ab", "a|b", "a*", "a+", "a?", "a*?", "a+?", "(a|b)+c*", "a{2,4}", "a{0,3}?", "(a)(b)c",
    "^abc$", "\\w+@\\w+", "[a-z]+[0-9]*", "(foo|bar)baz", "\\bfoo\\b", "(a(b(c)))", "x{3}",
];

fn every_pattern() -> impl Iterator<Item = threadre::Program> {
    PATTERNS.iter().map(|p| parse(p).unwrap())
}

#[test]
fn cleanup_leaves_no_degenerate_split_except_possibly_the_entry() {
    common::init();
    for prog in every_pattern() {
        for inst in prog.instructions() {
            if inst.mode != Mode::Split {
                continue;
            }
            let degenerate = match (inst.out, inst.out1) {
                (Some(a), Some(b)) => a == b,
                (Some(_), None) => true,
                (None, _) => true,
            };
            if degenerate {
                assert_eq!(inst.idx, 0, "non-entry degenerate split survived cleanup: {}", inst.describe());
            }
        }
    }
}

fn matches_and_match_index_agree(source: String, text: String) -> TestResult {
    let prog = match parse(&source) {
        Ok(p) => p,
        Err(_) => return TestResult::discard(),
    };
    let whole_match = prog.matches(&text);
    let index_match = prog.match_index(&text).is_some();
    TestResult::from_bool(whole_match == index_match)
}

fn submatch_ranges_are_well_formed(source: String, text: String) -> TestResult {
    let prog = match parse(&source) {
        Ok(p) => p,
        Err(_) => return TestResult::discard(),
    };
    let r = match prog.match_index(&text) {
        Some(r) => r,
        None => return TestResult::discard(),
    };
    if r[0] > r[1] {
        return TestResult::from_bool(false);
    }
    for pair in r.chunks(2).skip(1) {
        let ok = match (pair[0], pair[1]) {
            (-1, -1) => true,
            (lo, hi) => lo >= 0 && hi >= 0 && lo <= hi,
        };
        if !ok {
            return TestResult::from_bool(false);
        }
    }
    TestResult::from_bool(true)
}

#[test]
fn quickcheck_matches_and_match_index_agree() {
    common::init();
    for pattern in PATTERNS {
        let pattern = pattern.to_string();
        quickcheck(move |text: String| matches_and_match_index_agree(pattern.clone(), text));
    }
}

#[test]
fn quickcheck_submatch_ranges_are_well_formed() {
    common::init();
    for pattern in PATTERNS {
        let pattern = pattern.to_string();
        quickcheck(move |text: String| submatch_ranges_are_well_formed(pattern.clone(), text));
    }
}
