// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Thompson/Pike simultaneous-state simulation: steps once per input code
//! point, tracking every live thread in parallel, with no backtracking.
//!
//! Grounded on `defuz-regex/src/nfa.rs`'s `Nfa`/`Threads` (sparse/dense
//! active-state tracking, add-state epsilon closure via an explicit
//! stack) and `original_source/sre2/submatch.go`'s persistent capture
//! trail (`altpos`/`pair`), linearized "most recent wins" into a flat
//! `[2 * alts_count]` array on success.

use std::rc::Rc;

use crate::inst::{Inst, LeftRight, Mode};
use crate::sparse::StateSet;

/// One link in a thread's capture history: a single `(slot, position)`
/// assignment plus a shared pointer to everything recorded before it.
/// Threads that fork at a `Split` share their common tail for free; only
/// the new link is ever allocated.
struct CapNode {
    slot: usize,
    pos: usize,
    prev: Option<Rc<CapNode>>,
}

type Trail = Option<Rc<CapNode>>;

fn push_capture(prev: Trail, slot: usize, pos: usize) -> Trail {
    Some(Rc::new(CapNode { slot, pos, prev }))
}

/// Walk the trail from most-recent to oldest link, keeping the first
/// (i.e. most recent) assignment seen for each slot. `-1` marks a capture
/// slot that was never entered.
fn linearize(trail: &Trail, alts_count: u32) -> Vec<isize> {
    let mut out = vec![-1isize; 2 * alts_count as usize];
    let mut cur = trail.as_ref();
    while let Some(node) = cur {
        if out[node.slot] == -1 {
            out[node.slot] = node.pos as isize;
        }
        cur = node.prev.as_ref();
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_word_char_opt(c: Option<char>) -> bool {
    c.map_or(false, is_word_char)
}

/// Whether the zero-width assertion `lr` holds at a boundary between
/// `prev` (the code point just consumed, or `None` at the start of text)
/// and `next` (the code point about to be consumed, or `None` at the end
/// of text).
fn assertion_holds(lr: LeftRight, prev: Option<char>, next: Option<char>) -> bool {
    match lr {
        LeftRight::BeginText => prev.is_none(),
        LeftRight::EndText => next.is_none(),
        LeftRight::BeginLine => prev.is_none() || prev == Some('\n'),
        LeftRight::EndLine => next.is_none() || next == Some('\n'),
        LeftRight::WordBoundary => is_word_char_opt(prev) != is_word_char_opt(next),
        LeftRight::NotWordBoundary => is_word_char_opt(prev) == is_word_char_opt(next),
    }
}

/// Byte offsets for every boundary in `text`, one more entry than there
/// are code points (the final entry is `text.len()`, the end-of-text
/// position, paired with `None`).
fn boundaries(text: &str) -> Vec<(usize, Option<char>)> {
    let mut out: Vec<(usize, Option<char>)> = text.char_indices().map(|(i, c)| (i, Some(c))).collect();
    out.push((text.len(), None));
    out
}

/// Does `prog` match anywhere in `text`? Cheaper than [`match_index`]:
/// tracks only which instructions are live, no capture history.
pub fn matches(insts: &[Inst], text: &str) -> bool {
    let bounds = boundaries(text);
    let mut clist = StateSet::with_capacity(insts.len());
    let mut nlist = StateSet::with_capacity(insts.len());
    let mut stack: Vec<usize> = Vec::new();

    add_state_bool(insts, &mut clist, 0, None, bounds[0].1, &mut stack);

    for i in 0..bounds.len() {
        if clist.is_empty() {
            return false;
        }
        let cur = bounds[i].1;
        let next = bounds.get(i + 1).map_or(None, |&(_, c)| c);
        for pc in clist.iter().collect::<Vec<_>>() {
            match insts[pc].mode {
                Mode::Match => return true,
                Mode::RuneClass => {
                    if let Some(c) = cur {
                        if insts[pc].klass.as_ref().unwrap().matches(c) {
                            add_state_bool(insts, &mut nlist, insts[pc].out.unwrap(), cur, next, &mut stack);
                        }
                    }
                }
                _ => unreachable!("only RuneClass/Match instructions are ever added to the active list"),
            }
        }
        clist.clear();
        std::mem::swap(&mut clist, &mut nlist);
    }
    false
}

fn add_state_bool(
    insts: &[Inst],
    set: &mut StateSet,
    pc: usize,
    prev: Option<char>,
    next: Option<char>,
    stack: &mut Vec<usize>,
) {
    stack.clear();
    stack.push(pc);
    while let Some(pc) = stack.pop() {
        if set.put(pc) {
            continue;
        }
        match insts[pc].mode {
            Mode::Split => {
                if let Some(o1) = insts[pc].out1 {
                    stack.push(o1);
                }
                if let Some(o) = insts[pc].out {
                    stack.push(o);
                }
            }
            Mode::AltBegin | Mode::AltEnd => {
                if let Some(o) = insts[pc].out {
                    stack.push(o);
                }
            }
            Mode::LeftRight => {
                let lr = insts[pc].lr.expect("LeftRight instruction always carries a boundary kind");
                if assertion_holds(lr, prev, next) {
                    if let Some(o) = insts[pc].out {
                        stack.push(o);
                    }
                }
            }
            Mode::RuneClass | Mode::Match => {}
        }
    }
}

/// Find the leftmost match of `prog` in `text`, with submatch positions.
/// Returns a flat `[2 * alts_count]` array of byte offsets into `text`;
/// `result[0]`/`result[1]` are the whole match, `result[2*k]`/
/// `result[2*k+1]` are capture group `k`'s start/end, and `-1` marks a
/// group that never participated.
pub fn match_index(insts: &[Inst], alts_count: u32, text: &str) -> Option<Vec<isize>> {
    let bounds = boundaries(text);
    let mut clist = StateSet::with_capacity(insts.len());
    let mut nlist = StateSet::with_capacity(insts.len());
    let mut cthread: Vec<Trail> = vec![None; insts.len()];
    let mut nthread: Vec<Trail> = vec![None; insts.len()];
    let mut stack: Vec<(usize, Trail)> = Vec::new();
    let mut matched: Option<Vec<isize>> = None;

    let (pos0, cur0) = bounds[0];
    add_state_captures(insts, &mut clist, &mut cthread, 0, None, pos0, None, cur0, &mut stack);

    for i in 0..bounds.len() {
        if clist.is_empty() {
            break;
        }
        let (pos, cur) = bounds[i];
        let next_pos = bounds.get(i + 1).map_or(pos, |&(p, _)| p);
        let next = bounds.get(i + 1).map_or(None, |&(_, c)| c);

        for pc in clist.iter().collect::<Vec<_>>() {
            let trail = cthread[pc].clone();
            match insts[pc].mode {
                Mode::Match => {
                    matched = Some(linearize(&trail, alts_count));
                    // Lower-priority threads still in `clist` represent
                    // matches starting later or non-greedy alternatives
                    // already rejected by priority order; none of them
                    // can beat this one, so stop consuming this step.
                    break;
                }
                Mode::RuneClass => {
                    if let Some(c) = cur {
                        if insts[pc].klass.as_ref().unwrap().matches(c) {
                            add_state_captures(
                                insts,
                                &mut nlist,
                                &mut nthread,
                                insts[pc].out.unwrap(),
                                trail,
                                next_pos,
                                cur,
                                next,
                                &mut stack,
                            );
                        }
                    }
                }
                _ => unreachable!("only RuneClass/Match instructions are ever added to the active list"),
            }
        }
        clist.clear();
        std::mem::swap(&mut clist, &mut nlist);
        std::mem::swap(&mut cthread, &mut nthread);
    }
    matched
}

/// Epsilon closure of `pc`, seeded with `trail`/the boundary at `pos`.
/// `prev`/`next` are the code points either side of `pos`, used for
/// zero-width assertions; `pos` is the byte offset recorded into any
/// capture slot entered along the way.
#[allow(clippy::too_many_arguments)]
fn add_state_captures(
    insts: &[Inst],
    set: &mut StateSet,
    threads: &mut [Trail],
    pc: usize,
    trail: Trail,
    pos: usize,
    prev: Option<char>,
    next: Option<char>,
    stack: &mut Vec<(usize, Trail)>,
) {
    stack.clear();
    stack.push((pc, trail));
    while let Some((pc, trail)) = stack.pop() {
        if set.put(pc) {
            continue;
        }
        match insts[pc].mode {
            Mode::Split => {
                if let Some(o1) = insts[pc].out1 {
                    stack.push((o1, trail.clone()));
                }
                if let Some(o) = insts[pc].out {
                    stack.push((o, trail));
                }
            }
            Mode::AltBegin => {
                let id = insts[pc].alt.expect("AltBegin always carries a capture id");
                let trail = push_capture(trail, 2 * id as usize, pos);
                if let Some(o) = insts[pc].out {
                    stack.push((o, trail));
                }
            }
            Mode::AltEnd => {
                let id = insts[pc].alt.expect("AltEnd always carries a capture id");
                let trail = push_capture(trail, 2 * id as usize + 1, pos);
                if let Some(o) = insts[pc].out {
                    stack.push((o, trail));
                }
            }
            Mode::LeftRight => {
                let lr = insts[pc].lr.expect("LeftRight instruction always carries a boundary kind");
                if assertion_holds(lr, prev, next) {
                    if let Some(o) = insts[pc].out {
                        stack.push((o, trail));
                    }
                }
            }
            Mode::RuneClass | Mode::Match => {
                threads[pc] = trail;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::cleanup::cleanup;

    fn build(source: &str) -> (Vec<Inst>, u32) {
        let c = compile(source, 10_000).unwrap();
        (cleanup(c.insts), c.alts_count)
    }

    #[test]
    fn matches_literal_anywhere() {
        let (insts, _) = build("abc");
        assert!(matches(&insts, "xxabcxx"));
        assert!(!matches(&insts, "xyz"));
    }

    #[test]
    fn match_index_reports_whole_match_span() {
        let (insts, alts) = build("abc");
        let r = match_index(&insts, alts, "xxabcxx").unwrap();
        assert_eq!((r[0], r[1]), (2, 5));
    }

    #[test]
    fn captures_groups() {
        let (insts, alts) = build("(a)(b)");
        let r = match_index(&insts, alts, "ab").unwrap();
        assert_eq!(alts, 3); // group 0 (whole match) + 2 explicit groups
        assert_eq!((r[0], r[1]), (0, 2));
        assert_eq!((r[2], r[3]), (0, 1));
        assert_eq!((r[4], r[5]), (1, 2));
    }

    #[test]
    fn word_boundary() {
        let (insts, _) = build("\\bfoo\\b");
        assert!(matches(&insts, "a foo b"));
        assert!(!matches(&insts, "afoob"));
    }
}
