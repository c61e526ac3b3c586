// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A single-pass recursive-descent compiler: the parser reads the regex
//! source and emits instructions directly, with no separate AST stage.
//!
//! Grounded on `original_source/sre2/regexp.go`'s `parser` (cursor with
//! `nextc`/`out`/`instr`, direct emission of `kSplit`/`kAltBegin`/
//! `kAltEnd`/`kRuneClass` nodes) and `BurntSushi-regexp/src/parse.rs` for
//! the fuller escape/class/counted-repetition grammar.

use std::rc::Rc;

use log::{debug, trace};

use crate::class::{self, RuneClass};
use crate::error::ParseError;
use crate::inst::{Inst, LeftRight, Mode};

const MAX_REPEAT: usize = 1000;

#[derive(Clone, Copy, Debug)]
struct Flags {
    case_i: bool,
    dot_nl: bool,
    multi: bool,
    swap_greed: bool,
}

impl Default for Flags {
    fn default() -> Flags {
        Flags { case_i: false, dot_nl: false, multi: false, swap_greed: false }
    }
}

/// The result of compiling a regex source string: the flat instruction
/// array (before cleanup), the number of capture groups, and their names.
pub struct Compiled {
    pub insts: Vec<Inst>,
    pub alts_count: u32,
    pub names: Vec<Option<Rc<str>>>,
}

/// Compile `source` into an (uncleaned) instruction graph, honoring the
/// implicit wrapping rules of `wrap_source`.
pub fn compile(source: &str, size_limit: usize) -> Result<Compiled, ParseError> {
    let wrapped = wrap_source(source);
    trace!("wrapped {:?} as {:?}", source, wrapped);
    let mut p = Parser::new(&wrapped);

    let begin = p.fresh();
    let match_idx = p.fresh();
    p.insts[match_idx].mode = Mode::Match;

    let (start, end) = p.regexp()?;
    if let Some(ch) = p.ch {
        return Err(ParseError::UnexpectedMetacharacter { ch, position: p.pos });
    }
    p.connect(begin, start);
    p.connect(end, match_idx);

    debug!("compiled {:?} into {} raw instructions", source, p.insts.len());
    if p.insts.len() > size_limit {
        return Err(ParseError::ProgramTooLarge { limit: size_limit });
    }

    Ok(Compiled { insts: p.insts, alts_count: p.next_alt, names: p.names })
}

/// Implicit wrapping: make the regex search anywhere in the input and
/// capture the whole match as group 0.
fn wrap_source(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let (prefix, body_start) = if chars.first() == Some(&'^') {
        ("^(".to_string(), 1)
    } else {
        (".*?(".to_string(), 0)
    };
    let has_dollar = chars.len() > body_start && chars.last() == Some(&'$');
    let body_end = if has_dollar { chars.len() - 1 } else { chars.len() };

    let mut out = String::with_capacity(source.len() + 8);
    out.push_str(&prefix);
    out.extend(&chars[body_start..body_end]);
    out.push(')');
    if has_dollar {
        out.push('$');
    } else {
        out.push_str(".*?");
    }
    out
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    ch: Option<char>,
    insts: Vec<Inst>,
    names: Vec<Option<Rc<str>>>,
    next_alt: u32,
    flags: Flags,
}

impl Parser {
    fn new(source: &str) -> Parser {
        let chars: Vec<char> = source.chars().collect();
        let ch = chars.first().copied();
        Parser {
            chars,
            pos: 0,
            ch,
            insts: Vec::with_capacity(64),
            names: Vec::new(),
            next_alt: 0,
            flags: Flags::default(),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        self.pos += 1;
        self.ch = self.chars.get(self.pos).copied();
        self.ch
    }

    fn jump(&mut self, pos: usize) {
        self.pos = pos;
        self.ch = self.chars.get(pos).copied();
    }

    // -- instruction emission -------------------------------------------

    fn fresh(&mut self) -> usize {
        let idx = self.insts.len();
        self.insts.push(Inst::fresh(idx));
        idx
    }

    fn fresh_rune(&mut self, klass: RuneClass) -> usize {
        let idx = self.fresh();
        self.insts[idx].mode = Mode::RuneClass;
        self.insts[idx].klass = Some(klass);
        idx
    }

    fn anchor(&mut self, lr: LeftRight) -> usize {
        let idx = self.fresh();
        self.insts[idx].mode = Mode::LeftRight;
        self.insts[idx].lr = Some(lr);
        idx
    }

    fn literal_term(&mut self, c: char) -> (usize, usize) {
        let mut klass = RuneClass::new();
        klass.add_rune(c, false);
        if self.flags.case_i {
            klass = klass.with_ignore_case();
        }
        let idx = self.fresh_rune(klass);
        (idx, idx)
    }

    /// Connect `from`'s first unset edge to `to`. `Split` has two edges;
    /// every other mode has only `out`. Mirrors `original_source`'s
    /// `parser.out`.
    fn connect(&mut self, from: usize, to: usize) {
        if self.insts[from].out.is_none() {
            self.insts[from].out = Some(to);
        } else if self.insts[from].mode == Mode::Split && self.insts[from].out1.is_none() {
            self.insts[from].out1 = Some(to);
        } else {
            debug_assert!(false, "instruction {} already has both edges wired", from);
        }
    }

    // -- grammar -----------------------------------------------------------

    /// *regexp* = *closure\** terminated by end-of-input, `|`, or `)`.
    fn regexp(&mut self) -> Result<(usize, usize), ParseError> {
        let start = self.fresh();
        let mut curr = start;
        while !matches!(self.ch, None | Some('|') | Some(')')) {
            let (s, e) = self.closure()?;
            self.connect(curr, s);
            curr = e;
        }
        let end = self.fresh();
        self.connect(curr, end);
        Ok((start, end))
    }

    /// *regexp* (`|` *regexp*)* — alternation is only meaningful bounded by
    /// a group or the implicit top-level wrapping, so only `group` calls
    /// into this.
    fn alternation(&mut self) -> Result<(usize, usize), ParseError> {
        let (start, first_end) = self.regexp()?;
        if self.ch != Some('|') {
            return Ok((start, first_end));
        }
        let join = self.fresh();
        self.connect(first_end, join);

        let mut left = start;
        while self.ch == Some('|') {
            self.advance();
            let branch = self.fresh();
            self.connect(branch, left);
            let (s, e) = self.regexp()?;
            self.connect(branch, s);
            self.connect(e, join);
            left = branch;
        }
        Ok((left, join))
    }

    /// *closure* = *term* optional-repetition.
    fn closure(&mut self) -> Result<(usize, usize), ParseError> {
        let term_start = self.pos;
        let alt_before = self.next_alt;
        let (start, end) = self.term()?;
        let term_end = self.pos;

        match self.ch {
            Some('{') => self.repetition(term_start, term_end, alt_before),
            Some('?') => {
                self.advance();
                let greedy = self.suffix_greedy();
                Ok(self.wrap_optional(start, end, greedy))
            }
            Some('*') => {
                self.advance();
                let greedy = self.suffix_greedy();
                Ok(self.wrap_star(start, end, greedy))
            }
            Some('+') => {
                self.advance();
                let greedy = self.suffix_greedy();
                Ok(self.wrap_plus(start, end, greedy))
            }
            _ => Ok((start, end)),
        }
    }

    /// Consumes a trailing `?` that flips greediness, and returns whether
    /// this closure should be greedy.
    fn suffix_greedy(&mut self) -> bool {
        let base_greedy = !self.flags.swap_greed;
        if self.ch == Some('?') {
            self.advance();
            !base_greedy
        } else {
            base_greedy
        }
    }

    fn wrap_optional(&mut self, t_start: usize, t_end: usize, greedy: bool) -> (usize, usize) {
        let split = self.fresh();
        let join = self.fresh();
        if greedy {
            self.connect(split, t_start);
            self.connect(split, join);
        } else {
            self.connect(split, join);
            self.connect(split, t_start);
        }
        self.connect(t_end, join);
        (split, join)
    }

    fn wrap_star(&mut self, t_start: usize, t_end: usize, greedy: bool) -> (usize, usize) {
        let split = self.fresh();
        let join = self.fresh();
        if greedy {
            self.connect(split, t_start);
            self.connect(split, join);
        } else {
            self.connect(split, join);
            self.connect(split, t_start);
        }
        self.connect(t_end, split);
        (split, join)
    }

    fn wrap_plus(&mut self, t_start: usize, t_end: usize, greedy: bool) -> (usize, usize) {
        let split = self.fresh();
        self.connect(t_end, split);
        let join = self.fresh();
        if greedy {
            self.connect(split, t_start);
            self.connect(split, join);
        } else {
            self.connect(split, join);
            self.connect(split, t_start);
        }
        (t_start, join)
    }

    /// Re-parse the term spanning `[term_start, term_end)` char indices,
    /// restoring the cursor afterward. Used to materialize `{n,m}` copies.
    fn reparse_term(&mut self, term_start: usize, term_end: usize) -> Result<(usize, usize), ParseError> {
        let saved = self.pos;
        self.jump(term_start);
        let frag = self.term()?;
        debug_assert_eq!(self.pos, term_end, "term re-parse consumed a different span");
        self.jump(saved);
        Ok(frag)
    }

    fn reparse_with_reset(
        &mut self,
        term_start: usize,
        term_end: usize,
        alt_before: u32,
        alt_after_one: u32,
    ) -> Result<(usize, usize), ParseError> {
        self.next_alt = alt_before;
        let frag = self.reparse_term(term_start, term_end)?;
        self.next_alt = alt_after_one;
        Ok(frag)
    }

    /// `{n}` / `{n,}` / `{n,m}`, assuming `{` has just been seen (not yet
    /// consumed) and the first copy of the term has already been parsed
    /// once (to learn its span) starting at `term_start`/ending at
    /// `term_end`. That trial parse's instructions are discarded: every
    /// copy that ends up in the final program is produced by re-parsing
    /// the saved span.
    fn repetition(
        &mut self,
        term_start: usize,
        term_end: usize,
        alt_before: u32,
    ) -> Result<(usize, usize), ParseError> {
        let open_pos = self.pos;
        self.advance(); // consume '{'
        let (min, max) = self.parse_counts(open_pos)?;
        let greedy = self.suffix_greedy();
        self.validate_counts(min, max, open_pos)?;

        if min == 0 && max == Some(0) {
            return Err(ParseError::InvalidRepetition {
                position: open_pos,
                reason: "repeating zero times matches nothing".to_string(),
            });
        }

        if min == 0 {
            return match max {
                None => {
                    self.next_alt = alt_before;
                    let (s, e) = self.reparse_term(term_start, term_end)?;
                    Ok(self.wrap_star(s, e, greedy))
                }
                Some(m) => {
                    self.next_alt = alt_before;
                    let (s, e) = self.reparse_term(term_start, term_end)?;
                    let alt_after_one = self.next_alt;
                    self.bounded_optional(
                        term_start,
                        term_end,
                        alt_before,
                        alt_after_one,
                        m,
                        greedy,
                        Some((s, e)),
                    )
                }
            };
        }

        self.next_alt = alt_before;
        let (mut chain_start, mut chain_end) = self.reparse_term(term_start, term_end)?;
        let alt_after_one = self.next_alt;
        let first_start = chain_start;
        for _ in 1..min {
            let (s, e) = self.reparse_with_reset(term_start, term_end, alt_before, alt_after_one)?;
            self.connect(chain_end, s);
            chain_end = e;
        }
        chain_start = first_start;

        match max {
            None => {
                let (s, e) = self.reparse_with_reset(term_start, term_end, alt_before, alt_after_one)?;
                let (star_start, star_end) = self.wrap_star(s, e, greedy);
                self.connect(chain_end, star_start);
                Ok((chain_start, star_end))
            }
            Some(m) if m == min => Ok((chain_start, chain_end)),
            Some(m) => {
                let extra = m - min;
                let (opt_start, opt_end) = self.bounded_optional(
                    term_start,
                    term_end,
                    alt_before,
                    alt_after_one,
                    extra,
                    greedy,
                    None,
                )?;
                self.connect(chain_end, opt_start);
                Ok((chain_start, opt_end))
            }
        }
    }

    /// `count` nested optional copies, greedy-first: `(term (term (...)?)?)?`.
    fn bounded_optional(
        &mut self,
        term_start: usize,
        term_end: usize,
        alt_before: u32,
        alt_after_one: u32,
        count: usize,
        greedy: bool,
        reuse_first: Option<(usize, usize)>,
    ) -> Result<(usize, usize), ParseError> {
        if count == 0 {
            let idx = self.fresh();
            return Ok((idx, idx));
        }
        let (t_start, t_end) = match reuse_first {
            Some(frag) => frag,
            None => self.reparse_with_reset(term_start, term_end, alt_before, alt_after_one)?,
        };
        let (inner_start, inner_end) =
            self.bounded_optional(term_start, term_end, alt_before, alt_after_one, count - 1, greedy, None)?;
        self.connect(t_end, inner_start);
        let branch = self.fresh();
        if greedy {
            self.connect(branch, t_start);
            self.connect(branch, inner_start);
        } else {
            self.connect(branch, inner_start);
            self.connect(branch, t_start);
        }
        Ok((branch, inner_end))
    }

    fn parse_counts(&mut self, open_pos: usize) -> Result<(usize, Option<usize>), ParseError> {
        let min = self.parse_uint(open_pos)?;
        let max = if self.ch == Some(',') {
            self.advance();
            if self.ch == Some('}') {
                None
            } else {
                Some(self.parse_uint(open_pos)?)
            }
        } else {
            Some(min)
        };
        if self.ch != Some('}') {
            return Err(ParseError::InvalidRepetition {
                position: open_pos,
                reason: "missing closing '}'".to_string(),
            });
        }
        self.advance(); // consume '}'
        Ok((min, max))
    }

    fn parse_uint(&mut self, open_pos: usize) -> Result<usize, ParseError> {
        let start = self.pos;
        while self.ch.map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == start {
            return Err(ParseError::InvalidRepetition {
                position: open_pos,
                reason: "expected a repetition count".to_string(),
            });
        }
        let s: String = self.chars[start..self.pos].iter().collect();
        s.parse::<usize>().map_err(|_| ParseError::InvalidRepetition {
            position: open_pos,
            reason: format!("count '{}' is out of range", s),
        })
    }

    fn validate_counts(&self, min: usize, max: Option<usize>, open_pos: usize) -> Result<(), ParseError> {
        if min > MAX_REPEAT {
            return Err(ParseError::InvalidRepetition {
                position: open_pos,
                reason: format!("{} exceeds the maximum of {} repetitions", min, MAX_REPEAT),
            });
        }
        if let Some(m) = max {
            if m > MAX_REPEAT {
                return Err(ParseError::InvalidRepetition {
                    position: open_pos,
                    reason: format!("{} exceeds the maximum of {} repetitions", m, MAX_REPEAT),
                });
            }
            if m < min {
                return Err(ParseError::InvalidRepetition {
                    position: open_pos,
                    reason: "max repetitions is smaller than min repetitions".to_string(),
                });
            }
        }
        Ok(())
    }

    /// *term* = `(`...group...`)` | rune class | `.` | anchor | escape |
    /// `\Q`...`\E` | literal rune.
    fn term(&mut self) -> Result<(usize, usize), ParseError> {
        let pos = self.pos;
        match self.ch {
            None => Err(ParseError::UnexpectedEndOfInput { position: pos }),
            Some(c @ ('*' | '+' | '?')) => Err(ParseError::UnexpectedMetacharacter { ch: c, position: pos }),
            Some(c @ (')' | '}' | ']')) => Err(ParseError::UnexpectedMetacharacter { ch: c, position: pos }),
            Some('(') => self.group(),
            Some('[') => self.char_class(),
            Some('.') => {
                let klass = RuneClass::any(self.flags.dot_nl);
                let idx = self.fresh_rune(klass);
                self.advance();
                Ok((idx, idx))
            }
            Some('^') => {
                let lr = if self.flags.multi { LeftRight::BeginLine } else { LeftRight::BeginText };
                let idx = self.anchor(lr);
                self.advance();
                Ok((idx, idx))
            }
            Some('$') => {
                let lr = if self.flags.multi { LeftRight::EndLine } else { LeftRight::EndText };
                let idx = self.anchor(lr);
                self.advance();
                Ok((idx, idx))
            }
            Some('\\') => self.escape_term(),
            Some(c) => {
                self.advance();
                Ok(self.literal_term(c))
            }
        }
    }

    fn escape_term(&mut self) -> Result<(usize, usize), ParseError> {
        let bpos = self.pos;
        self.advance(); // consume '\'
        match self.ch {
            None => Err(ParseError::UnexpectedEndOfInput { position: bpos }),
            Some('Q') => self.quoted_literal(bpos),
            Some('A') => {
                let idx = self.anchor(LeftRight::BeginText);
                self.advance();
                Ok((idx, idx))
            }
            Some('z') => {
                let idx = self.anchor(LeftRight::EndText);
                self.advance();
                Ok((idx, idx))
            }
            Some('b') => {
                let idx = self.anchor(LeftRight::WordBoundary);
                self.advance();
                Ok((idx, idx))
            }
            Some('B') => {
                let idx = self.anchor(LeftRight::NotWordBoundary);
                self.advance();
                Ok((idx, idx))
            }
            Some(c @ ('d' | 'D' | 's' | 'S' | 'w' | 'W')) => {
                let table = class::perl_class(c).expect("perl class table is total over d/D/s/S/w/W");
                let mut klass = RuneClass::new();
                klass.add_table(table, c.is_ascii_uppercase());
                if self.flags.case_i {
                    klass = klass.with_ignore_case();
                }
                self.advance();
                let idx = self.fresh_rune(klass);
                Ok((idx, idx))
            }
            Some('p') | Some('P') => self.unicode_class_term(bpos),
            Some('x') => self.hex_escape(bpos),
            Some(c) if c.is_ascii_digit() => Ok(self.octal_escape()),
            Some(c) => {
                let lit = match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'v' => '\x0B',
                    'f' => '\x0C',
                    'a' => '\x07',
                    c if !c.is_alphanumeric() => c,
                    c => return Err(ParseError::InvalidEscape { ch: c, position: bpos }),
                };
                self.advance();
                Ok(self.literal_term(lit))
            }
        }
    }

    fn quoted_literal(&mut self, opened_at: usize) -> Result<(usize, usize), ParseError> {
        self.advance(); // consume 'Q'
        let start = self.pos;
        let end;
        loop {
            match self.ch {
                None => return Err(ParseError::UnterminatedLiteral { opened_at }),
                Some('\\') if self.peek(1) == Some('E') => {
                    end = self.pos;
                    self.advance();
                    self.advance();
                    break;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let text: Vec<char> = self.chars[start..end].to_vec();
        if text.is_empty() {
            let idx = self.fresh();
            return Ok((idx, idx));
        }
        let mut chain_start = None;
        let mut chain_end = None;
        for c in text {
            let (s, e) = self.literal_term(c);
            match chain_end {
                None => chain_start = Some(s),
                Some(pe) => self.connect(pe, s),
            }
            chain_end = Some(e);
        }
        Ok((chain_start.unwrap(), chain_end.unwrap()))
    }

    /// `\p{Name}` / `\pX` / `\P{Name}` / `\PX`, resolved to a `RuneClass`
    /// without emitting an instruction. Shared by `unicode_class_term`
    /// (standalone term) and `class_escape` (embedded in `[...]`).
    fn unicode_class_value(&mut self, start: usize) -> Result<RuneClass, ParseError> {
        let negated = self.ch == Some('P');
        self.advance(); // consume 'p' or 'P'
        let name = if self.ch == Some('{') {
            self.advance();
            let name_start = self.pos;
            loop {
                match self.ch {
                    None => return Err(ParseError::UnterminatedLiteral { opened_at: start }),
                    Some('}') => break,
                    Some(_) => {
                        self.advance();
                    }
                }
            }
            let name: String = self.chars[name_start..self.pos].iter().collect();
            self.advance(); // consume '}'
            name
        } else {
            match self.ch {
                Some(c) => {
                    self.advance();
                    c.to_string()
                }
                None => return Err(ParseError::UnexpectedEndOfInput { position: self.pos }),
            }
        };
        let mut klass = class::unicode_class(&name)
            .ok_or_else(|| ParseError::UnknownClassName { name: name.clone(), position: start })?;
        if negated {
            klass = negate_class(klass);
        }
        Ok(klass)
    }

    fn unicode_class_term(&mut self, start: usize) -> Result<(usize, usize), ParseError> {
        let mut klass = self.unicode_class_value(start)?;
        if self.flags.case_i {
            klass = klass.with_ignore_case();
        }
        let idx = self.fresh_rune(klass);
        Ok((idx, idx))
    }

    /// `\xHH` / `\x{HHHH}`, resolved to a `char` without emitting an
    /// instruction. Shared by `hex_escape` and `class_escape`/`range_endpoint`.
    fn hex_escape_char(&mut self, start: usize) -> Result<char, ParseError> {
        self.advance(); // consume 'x'
        let digits: String = if self.ch == Some('{') {
            self.advance();
            let digit_start = self.pos;
            while self.ch.map_or(false, |c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            let digits: String = self.chars[digit_start..self.pos].iter().collect();
            if self.ch != Some('}') || digits.is_empty() {
                return Err(ParseError::InvalidHex { position: start });
            }
            self.advance(); // consume '}'
            digits
        } else {
            let digit_start = self.pos;
            for _ in 0..2 {
                if !self.ch.map_or(false, |c| c.is_ascii_hexdigit()) {
                    return Err(ParseError::InvalidHex { position: start });
                }
                self.advance();
            }
            self.chars[digit_start..self.pos].iter().collect()
        };
        let n = u32::from_str_radix(&digits, 16).map_err(|_| ParseError::InvalidHex { position: start })?;
        char::from_u32(n).ok_or(ParseError::InvalidHex { position: start })
    }

    fn hex_escape(&mut self, start: usize) -> Result<(usize, usize), ParseError> {
        let ch = self.hex_escape_char(start)?;
        Ok(self.literal_term(ch))
    }

    /// Up to three octal digits, resolved to a `char` without emitting an
    /// instruction. Shared by `octal_escape` and `class_escape`/`range_endpoint`.
    ///
    /// Both callers only dispatch here when the current char is an ASCII
    /// digit, so at least one octal digit is always consumed; a digit 8/9
    /// simply ends the run early rather than erroring (it is itself read as
    /// the next term/class member).
    fn octal_escape_char(&mut self) -> char {
        let mut digits = String::new();
        while digits.len() < 3 {
            match self.ch {
                Some(c) if ('0'..='7').contains(&c) => {
                    digits.push(c);
                    self.advance();
                }
                _ => break,
            }
        }
        let n = u32::from_str_radix(&digits, 8).unwrap_or(0);
        char::from_u32(n).unwrap_or('\0')
    }

    fn octal_escape(&mut self) -> (usize, usize) {
        let ch = self.octal_escape_char();
        self.literal_term(ch)
    }

    /// Rune classes `[...]`, with POSIX `[:name:]` shorthand and negation.
    fn char_class(&mut self) -> Result<(usize, usize), ParseError> {
        let opened_at = self.pos;
        self.advance(); // consume '['
        let mut klass = RuneClass::new();
        let negate_whole = self.ch == Some('^');
        if negate_whole {
            self.advance();
        }

        let mut first = true;
        loop {
            match self.ch {
                None => return Err(ParseError::UnclosedClass { opened_at }),
                Some(']') if !first => {
                    self.advance();
                    break;
                }
                Some('[') if self.peek(1) == Some(':') => {
                    self.parse_posix_class(&mut klass, negate_whole)?;
                }
                Some('\\') => {
                    if let Some(lo) = self.class_escape(&mut klass, negate_whole)? {
                        self.class_item_or_range(&mut klass, negate_whole, opened_at, lo)?;
                    }
                }
                Some(lo) => {
                    self.advance();
                    self.class_item_or_range(&mut klass, negate_whole, opened_at, lo)?;
                }
            }
            first = false;
        }

        if self.flags.case_i {
            klass = klass.with_ignore_case();
        }
        let idx = self.fresh_rune(klass);
        Ok((idx, idx))
    }

    /// Having already consumed a range's low endpoint `lo`, check for a
    /// trailing `-hi` and add either the range or the lone rune to `klass`.
    fn class_item_or_range(
        &mut self,
        klass: &mut RuneClass,
        negate_whole: bool,
        opened_at: usize,
        lo: char,
    ) -> Result<(), ParseError> {
        if self.ch == Some('-') && !matches!(self.peek(1), Some(']') | None) {
            self.advance(); // consume '-'
            let hi = self.range_endpoint(opened_at)?;
            if lo > hi {
                return Err(ParseError::InvalidRange { lo, hi, position: opened_at });
            }
            klass.add_rune_range(lo, hi, negate_whole);
        } else {
            klass.add_rune(lo, negate_whole);
        }
        Ok(())
    }

    /// One endpoint of a `lo-hi` range: a literal char, or a single-char
    /// escape (`\n \t \r \v \f \a`, hex/octal, escaped punctuation).
    /// Multi-character escapes (`\d`, `\p{...}`, ...) can't bound a range.
    fn range_endpoint(&mut self, opened_at: usize) -> Result<char, ParseError> {
        match self.ch {
            Some('\\') => {
                let bpos = self.pos;
                self.advance();
                match self.ch {
                    None => Err(ParseError::UnexpectedEndOfInput { position: bpos }),
                    Some('n') => {
                        self.advance();
                        Ok('\n')
                    }
                    Some('t') => {
                        self.advance();
                        Ok('\t')
                    }
                    Some('r') => {
                        self.advance();
                        Ok('\r')
                    }
                    Some('v') => {
                        self.advance();
                        Ok('\x0B')
                    }
                    Some('f') => {
                        self.advance();
                        Ok('\x0C')
                    }
                    Some('a') => {
                        self.advance();
                        Ok('\x07')
                    }
                    Some('x') => self.hex_escape_char(bpos),
                    Some(c) if c.is_ascii_digit() => Ok(self.octal_escape_char()),
                    Some(c) if !c.is_alphanumeric() => {
                        self.advance();
                        Ok(c)
                    }
                    Some(c) => Err(ParseError::InvalidEscape { ch: c, position: bpos }),
                }
            }
            Some(c) => {
                self.advance();
                Ok(c)
            }
            None => Err(ParseError::UnclosedClass { opened_at }),
        }
    }

    fn parse_posix_class(&mut self, klass: &mut RuneClass, negate_whole: bool) -> Result<(), ParseError> {
        let start = self.pos;
        self.advance();
        self.advance(); // consume '[' ':'
        let neg_inner = self.ch == Some('^');
        if neg_inner {
            self.advance();
        }
        let name_start = self.pos;
        loop {
            match self.ch {
                None => return Err(ParseError::UnclosedClass { opened_at: start }),
                Some(':') => break,
                Some(_) => {
                    self.advance();
                }
            }
        }
        let name: String = self.chars[name_start..self.pos].iter().collect();
        self.advance(); // consume ':'
        if self.ch != Some(']') {
            return Err(ParseError::UnclosedClass { opened_at: start });
        }
        self.advance(); // consume ']'
        let table = class::ascii_class(&name)
            .ok_or_else(|| ParseError::UnknownClassName { name: name.clone(), position: start })?;
        klass.add_table(table, neg_inner ^ negate_whole);
        Ok(())
    }

    /// Parse one `\...` escape inside a character class (`self.ch` is
    /// `Some('\\')` on entry). An escape that resolves to a single code
    /// point (`\n \t \r \v \f \a`, hex/octal, escaped punctuation) is
    /// returned as `Some(char)` without touching `klass`, so the caller can
    /// check for a following `-hi` range; a multi-character escape (`\d`,
    /// `\p{...}`, ...) is added to `klass` directly and `None` is returned.
    /// Routes through the same `hex_escape_char`/`octal_escape_char`/
    /// `unicode_class_value` helpers `term()` uses outside of classes.
    fn class_escape(&mut self, klass: &mut RuneClass, negate_whole: bool) -> Result<Option<char>, ParseError> {
        let bpos = self.pos;
        self.advance(); // consume '\'
        match self.ch {
            None => Err(ParseError::UnexpectedEndOfInput { position: bpos }),
            Some(c @ ('d' | 'D' | 's' | 'S' | 'w' | 'W')) => {
                let table = class::perl_class(c).expect("perl class table is total over d/D/s/S/w/W");
                klass.add_table(table, c.is_ascii_uppercase() ^ negate_whole);
                self.advance();
                Ok(None)
            }
            Some('p') | Some('P') => {
                let other = self.unicode_class_value(bpos)?;
                klass.add_class(other, negate_whole);
                Ok(None)
            }
            Some('n') => {
                self.advance();
                Ok(Some('\n'))
            }
            Some('t') => {
                self.advance();
                Ok(Some('\t'))
            }
            Some('r') => {
                self.advance();
                Ok(Some('\r'))
            }
            Some('v') => {
                self.advance();
                Ok(Some('\x0B'))
            }
            Some('f') => {
                self.advance();
                Ok(Some('\x0C'))
            }
            Some('a') => {
                self.advance();
                Ok(Some('\x07'))
            }
            Some('x') => Ok(Some(self.hex_escape_char(bpos)?)),
            Some(c) if c.is_ascii_digit() => Ok(Some(self.octal_escape_char())),
            Some(c) if !c.is_alphanumeric() => {
                self.advance();
                Ok(Some(c))
            }
            Some(c) => Err(ParseError::InvalidEscape { ch: c, position: bpos }),
        }
    }

    /// `(`...group...`)`: named capture `(?P<name>...)`, non-capturing with
    /// transient flags `(?flags[-flags]:...)`, flags-only `(?flags)`, or a
    /// plain numbered capture.
    fn group(&mut self) -> Result<(usize, usize), ParseError> {
        let opened_at = self.pos;
        self.advance(); // consume '('
        let saved_flags = self.flags;
        let mut capturing = true;
        let mut name: Option<Rc<str>> = None;

        if self.ch == Some('?') {
            self.advance();
            match self.ch {
                Some('P') => {
                    self.advance();
                    if self.ch != Some('<') {
                        return Err(ParseError::UnexpectedMetacharacter {
                            ch: self.ch.unwrap_or('\0'),
                            position: self.pos,
                        });
                    }
                    self.advance();
                    let name_start = self.pos;
                    while self.ch.map_or(false, |c| c != '>') {
                        self.advance();
                    }
                    if self.ch != Some('>') {
                        return Err(ParseError::UnclosedGroup { opened_at });
                    }
                    let s: String = self.chars[name_start..self.pos].iter().collect();
                    name = Some(Rc::from(s));
                    self.advance(); // consume '>'
                }
                _ => {
                    capturing = false;
                    let mut new_flags = self.flags;
                    let mut negate = false;
                    loop {
                        match self.ch {
                            Some(':') => {
                                self.advance();
                                break;
                            }
                            Some(')') => {
                                self.flags = new_flags;
                                self.advance();
                                let idx = self.fresh();
                                return Ok((idx, idx));
                            }
                            Some('-') => {
                                negate = true;
                                self.advance();
                            }
                            Some(c) => {
                                match c {
                                    'i' => new_flags.case_i = !negate,
                                    's' => new_flags.dot_nl = !negate,
                                    'm' => new_flags.multi = !negate,
                                    'U' => new_flags.swap_greed = !negate,
                                    _ => return Err(ParseError::UnknownFlag { ch: c, position: self.pos }),
                                }
                                self.advance();
                            }
                            None => return Err(ParseError::UnclosedGroup { opened_at }),
                        }
                    }
                    self.flags = new_flags;
                }
            }
        }

        let alt_id = if capturing {
            let id = self.next_alt;
            self.next_alt += 1;
            if self.names.len() <= id as usize {
                self.names.resize(id as usize + 1, None);
            }
            self.names[id as usize] = name.clone();
            Some(id)
        } else {
            None
        };

        let (body_start, body_end) = self.alternation()?;

        if self.ch != Some(')') {
            return Err(ParseError::UnclosedGroup { opened_at });
        }
        self.advance(); // consume ')'
        self.flags = saved_flags;

        match alt_id {
            Some(id) => {
                let begin = self.fresh();
                self.insts[begin].mode = Mode::AltBegin;
                self.insts[begin].alt = Some(id);
                self.insts[begin].alt_id = name.clone();
                self.connect(begin, body_start);

                let end = self.fresh();
                self.insts[end].mode = Mode::AltEnd;
                self.insts[end].alt = Some(id);
                self.insts[end].alt_id = name;
                self.connect(body_end, end);

                Ok((begin, end))
            }
            None => Ok((body_start, body_end)),
        }
    }
}

fn negate_class(klass: RuneClass) -> RuneClass {
    let mut negated = RuneClass::new();
    negated.add_class(klass, true);
    negated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::cleanup;

    fn compiled(source: &str) -> Vec<Inst> {
        let c = compile(source, 10_000).unwrap();
        cleanup(c.insts)
    }

    #[test]
    fn wraps_unanchored_source() {
        assert_eq!(wrap_source("ab"), ".*?(ab).*?");
    }

    #[test]
    fn wraps_fully_anchored_source() {
        assert_eq!(wrap_source("^ab$"), "^(ab)$");
    }

    #[test]
    fn compiles_without_panicking() {
        for src in &["a", "a|b", "(a|b)+c*", "a{2,4}", "[a-z]+", "(?i:AbC)", "\\bfoo\\b"] {
            compiled(src);
        }
    }
}
