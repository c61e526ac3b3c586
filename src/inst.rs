// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The instruction graph: a flat array of linked instruction records.
//!
//! Every instruction carries the same fields regardless of its `mode`; which
//! fields are meaningful is determined entirely by `mode`. This keeps the
//! cleanup pass (which rewrites `out`/`out1` edges generically) blind to
//! what kind of instruction it is patching.

use std::rc::Rc;

use crate::class::RuneClass;

/// What an instruction does when the simulator reaches it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Proceed down `out` and `out1`, consuming no input.
    Split,
    /// Beginning of a capture group; consumes no input.
    AltBegin,
    /// End of a capture group; consumes no input.
    AltEnd,
    /// Consumes exactly one code point iff it matches `klass`.
    RuneClass,
    /// A zero-width assertion; consumes no input.
    LeftRight,
    /// The unique terminal instruction.
    Match,
}

/// The six zero-width boundary assertions an anchor can compile to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeftRight {
    BeginText,
    BeginLine,
    EndText,
    EndLine,
    WordBoundary,
    NotWordBoundary,
}

/// A single instruction in a compiled program.
///
/// `out`/`out1` are forward references to other instructions in the same
/// program, interpreted according to `mode`: `Split` uses both, `AltBegin`/
/// `AltEnd`/`RuneClass`/`LeftRight` use only `out`, `Match` uses neither.
#[derive(Clone, Debug)]
pub struct Inst {
    pub idx: usize,
    pub mode: Mode,
    pub out: Option<usize>,
    pub out1: Option<usize>,
    pub klass: Option<RuneClass>,
    pub lr: Option<LeftRight>,
    pub alt: Option<u32>,
    pub alt_id: Option<Rc<str>>,
}

impl Inst {
    /// A fresh, unwired `Split` placeholder. Every instruction starts life
    /// as one of these; emission either fills in real content (`RuneClass`,
    /// `Match`, `AltBegin`/`AltEnd`, `LeftRight`) or leaves it as pure glue,
    /// in which case the cleanup pass (`crate::cleanup`) collapses it away.
    pub fn fresh(idx: usize) -> Inst {
        Inst {
            idx,
            mode: Mode::Split,
            out: None,
            out1: None,
            klass: None,
            lr: None,
            alt: None,
            alt_id: None,
        }
    }

    /// One line of debug text: index, mode, outs, and class/boundary
    /// details.
    pub fn describe(&self) -> String {
        let mut s = format!("{:>4}: ", self.idx);
        match self.mode {
            Mode::Split => s.push_str("Split"),
            Mode::AltBegin => s.push_str("AltBegin"),
            Mode::AltEnd => s.push_str("AltEnd"),
            Mode::RuneClass => s.push_str("RuneClass"),
            Mode::LeftRight => s.push_str("LeftRight"),
            Mode::Match => s.push_str("Match"),
        }
        if let Some(out) = self.out {
            s.push_str(&format!(" out={}", out));
        }
        if let Some(out1) = self.out1 {
            s.push_str(&format!(" out1={}", out1));
        }
        if let Some(alt) = self.alt {
            s.push_str(&format!(" alt={}", alt));
            if let Some(ref name) = self.alt_id {
                s.push_str(&format!(" alt_id={}", name));
            }
        }
        if let Some(lr) = self.lr {
            s.push_str(&format!(" lr={:?}", lr));
        }
        if let Some(ref klass) = self.klass {
            s.push_str(&format!(" klass={:?}", klass));
        }
        s
    }
}
