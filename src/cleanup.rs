// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Post-compilation cleanup: every instruction the compiler emits starts
//! life as an unwired `Split` (`Inst::fresh`), and concatenation/grouping
//! leaves most of them as pure glue with only one real edge wired. This
//! pass forwards every edge past such glue directly to its real
//! destination, then drops whatever became unreachable and renumbers what
//! remains.
//!
//! Grounded on `original_source/sre2/regexp.go`'s `cleanup`, which performs
//! the same two-step collapse-then-compact over its own `[]*instr`.

use std::collections::HashSet;

use log::{debug, trace};

use crate::inst::{Inst, Mode};

/// Run the full cleanup pipeline: collapse degenerate splits, then compact
/// the array to only what is reachable from the entry instruction (index
/// 0, always kept regardless of its own degeneracy).
pub fn cleanup(mut insts: Vec<Inst>) -> Vec<Inst> {
    let before = insts.len();
    collapse_degenerate_splits(&mut insts);
    let insts = compact(insts);
    debug!("cleanup: {} raw instructions -> {} after collapse and compaction", before, insts.len());
    insts
}

/// A `Split` with only one live edge (`out1` unset, or both edges equal)
/// carries no branching decision and can be skipped over.
fn is_degenerate(inst: &Inst) -> bool {
    inst.mode == Mode::Split
        && match (inst.out, inst.out1) {
            (Some(a), Some(b)) => a == b,
            (Some(_), None) => true,
            (None, _) => false,
        }
}

/// Follow a chain of degenerate splits starting at `start`, returning the
/// first non-degenerate node reached. A `visited` set guards against a
/// split chain that loops on itself (e.g. from a doubly-starred
/// subexpression); such a cycle is broken by stopping at the repeated
/// node; the matcher's own epsilon-closure bookkeeping keeps that safe
/// even if the stuck node is itself still reachable at simulation time.
fn resolve(insts: &[Inst], start: usize) -> usize {
    let mut visited = HashSet::new();
    let mut cur = start;
    loop {
        if !visited.insert(cur) {
            return cur;
        }
        if !is_degenerate(&insts[cur]) {
            return cur;
        }
        match insts[cur].out {
            Some(next) => cur = next,
            None => return cur,
        }
    }
}

fn collapse_degenerate_splits(insts: &mut [Inst]) {
    let resolved: Vec<(Option<usize>, Option<usize>)> = insts
        .iter()
        .map(|inst| {
            let out = inst.out.map(|o| resolve(insts, o));
            let out1 = inst.out1.map(|o| resolve(insts, o));
            (out, out1)
        })
        .collect();
    for (inst, (out, out1)) in insts.iter_mut().zip(resolved) {
        if inst.out != out || inst.out1 != out1 {
            trace!("collapsed instruction {}: out {:?}->{:?} out1 {:?}->{:?}", inst.idx, inst.out, out, inst.out1, out1);
        }
        inst.out = out;
        inst.out1 = out1;
    }
}

/// Drop everything unreachable from index 0 and renumber what remains.
/// Index 0 is always kept: it is the entry point by convention, not by
/// reachability (collapsing may leave it as a degenerate split pointing
/// straight at the real start).
fn compact(insts: Vec<Inst>) -> Vec<Inst> {
    let n = insts.len();
    let mut reachable = vec![false; n];
    reachable[0] = true;
    let mut stack = vec![0usize];
    while let Some(i) = stack.pop() {
        let inst = &insts[i];
        for next in [inst.out, inst.out1].into_iter().flatten() {
            if !reachable[*next] {
                reachable[*next] = true;
                stack.push(*next);
            }
        }
    }

    let mut new_index = vec![usize::MAX; n];
    let mut order = Vec::with_capacity(n);
    for i in 0..n {
        if reachable[i] {
            new_index[i] = order.len();
            order.push(i);
        }
    }

    let mut slots: Vec<Option<Inst>> = insts.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(order.len());
    for (new_idx, old_idx) in order.into_iter().enumerate() {
        let mut inst = slots[old_idx].take().expect("each reachable index visited once");
        inst.idx = new_idx;
        inst.out = inst.out.map(|o| new_index[o]);
        inst.out1 = inst.out1.map(|o| new_index[o]);
        out.push(inst);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::Inst;

    fn split(idx: usize, out: Option<usize>, out1: Option<usize>) -> Inst {
        let mut i = Inst::fresh(idx);
        i.out = out;
        i.out1 = out1;
        i
    }

    #[test]
    fn collapses_a_glue_chain() {
        // 0 -> 1 -> 2 -> 3 (match); 1 and 2 are pure glue.
        let mut insts = vec![split(0, Some(1), None), split(1, Some(2), None), split(2, Some(3), None), Inst::fresh(3)];
        insts[3].mode = Mode::Match;
        let cleaned = cleanup(insts);
        assert_eq!(cleaned.len(), 2, "only the entry and the match node survive");
        assert_eq!(cleaned[0].out, Some(1));
        assert_eq!(cleaned[1].mode, Mode::Match);
    }

    #[test]
    fn breaks_a_self_loop_without_panicking() {
        let mut insts = vec![split(0, Some(1), None), split(1, Some(1), Some(1))];
        insts[1].mode = Mode::Split;
        let cleaned = cleanup(insts);
        assert!(!cleaned.is_empty());
    }

    #[test]
    fn keeps_entry_even_when_unreferenced() {
        let mut insts = vec![split(0, Some(1), None), Inst::fresh(1)];
        insts[1].mode = Mode::Match;
        let cleaned = cleanup(insts);
        assert_eq!(cleaned[0].idx, 0);
        assert_eq!(cleaned[0].out, Some(1));
    }
}
