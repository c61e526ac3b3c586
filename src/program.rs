// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A compiled, cleaned-up instruction graph ready for simulation.

use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::cleanup::cleanup;
use crate::compile::compile;
use crate::error::ParseError;
use crate::inst::Inst;
use crate::matcher;

/// The default cap on a compiled program's instruction count, guarding
/// against runaway repetition counts (e.g. `a{1000}{1000}`). Pass a
/// different limit to [`Program::compile_with_limit`].
pub const DEFAULT_SIZE_LIMIT: usize = 100_000;

/// A regular expression, compiled down to a flat instruction graph.
#[derive(Clone, Debug)]
pub struct Program {
    insts: Vec<Inst>,
    alts_count: u32,
    names: Vec<Option<Rc<str>>>,
    original: String,
}

impl Program {
    /// Compile `source`, capping the resulting program at
    /// [`DEFAULT_SIZE_LIMIT`] instructions.
    pub fn compile(source: &str) -> Result<Program, ParseError> {
        Program::compile_with_limit(source, DEFAULT_SIZE_LIMIT)
    }

    /// Compile `source`, capping the resulting program at `size_limit`
    /// instructions (checked before cleanup, since cleanup only shrinks
    /// the program further).
    pub fn compile_with_limit(source: &str, size_limit: usize) -> Result<Program, ParseError> {
        let compiled = compile(source, size_limit)?;
        let insts = cleanup(compiled.insts);
        debug!("program for {:?}: {} instructions, {} capture groups", source, insts.len(), compiled.alts_count);
        Ok(Program { insts, alts_count: compiled.alts_count, names: compiled.names, original: source.to_string() })
    }

    /// The regex source this program was compiled from.
    pub fn source(&self) -> &str {
        &self.original
    }

    /// The number of capture groups, including the implicit group 0 for
    /// the whole match.
    pub fn num_alts(&self) -> u32 {
        self.alts_count
    }

    /// The name given to capture group `id` via `(?P<name>...)`, if any.
    pub fn capture_names(&self) -> &[Option<Rc<str>>] {
        &self.names
    }

    /// Does this program match anywhere in `text`?
    pub fn matches(&self, text: &str) -> bool {
        matcher::matches(&self.insts, text)
    }

    /// Find the leftmost match in `text`, with submatch positions. See
    /// [`matcher::match_index`] for the result layout.
    pub fn match_index(&self, text: &str) -> Option<Vec<isize>> {
        matcher::match_index(&self.insts, self.alts_count, text)
    }

    /// Raw access to the compiled instructions, for debugging and tests.
    pub fn instructions(&self) -> &[Inst] {
        &self.insts
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {:?}", self.original)?;
        for inst in &self.insts {
            writeln!(f, "{}", inst.describe())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_programs() {
        let err = Program::compile_with_limit("a{1000}{1000}", 1_000).unwrap_err();
        assert!(matches!(err, ParseError::ProgramTooLarge { .. }));
    }

    #[test]
    fn display_includes_source_and_instructions() {
        let p = Program::compile("ab").unwrap();
        let text = format!("{}", p);
        assert!(text.contains("\"ab\""));
        assert!(text.lines().count() > 1);
    }
}
