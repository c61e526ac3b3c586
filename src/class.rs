// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A predicate on a single code point.
//!
//! A `RuneClass` is a tagged sum over {literal rune, range, table, built-in
//! predicate} rather than a class hierarchy, exactly as recommended in the
//! engine's design notes: `matches` dispatches on the item's tag, and
//! case-insensitivity is a flag handled centrally rather than by rewriting
//! every item in the class.

use once_cell::sync::Lazy;
use unicode_categories::UnicodeCategories;

/// A single member of a rune class's include/exclude list.
#[derive(Clone, Debug)]
pub enum ClassItem {
    Rune(char),
    Range(char, char),
    Table(&'static [(char, char)]),
    /// A named predicate, e.g. a Unicode general category or script.
    Predicate(&'static str, fn(char) -> bool),
}

impl ClassItem {
    fn matches(&self, r: char) -> bool {
        match *self {
            ClassItem::Rune(c) => c == r,
            ClassItem::Range(lo, hi) => lo <= r && r <= hi,
            ClassItem::Table(ranges) => {
                ranges.iter().any(|&(lo, hi)| lo <= r && r <= hi)
            }
            ClassItem::Predicate(_, f) => f(r),
        }
    }
}

/// A predicate on a single code point: matches iff some inclusion item
/// matches and no exclusion item matches. An empty inclusion list means
/// "match everything" (used for `.`).
#[derive(Clone, Debug, Default)]
pub struct RuneClass {
    include: Vec<ClassItem>,
    exclude: Vec<ClassItem>,
    ignore_case: bool,
}

impl RuneClass {
    pub fn new() -> RuneClass {
        RuneClass::default()
    }

    /// A class that matches any code point (used for `.` without the `s`
    /// flag the caller is responsible for excluding `\n` itself).
    pub fn any(include_newline: bool) -> RuneClass {
        let mut c = RuneClass::new();
        if !include_newline {
            c.exclude.push(ClassItem::Rune('\n'));
        }
        c
    }

    pub fn with_ignore_case(mut self) -> RuneClass {
        self.ignore_case = true;
        self
    }

    pub fn is_ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn add_rune(&mut self, r: char, negate: bool) {
        let item = ClassItem::Rune(r);
        if negate {
            self.exclude.push(item);
        } else {
            self.include.push(item);
        }
    }

    pub fn add_rune_range(&mut self, lo: char, hi: char, negate: bool) {
        let item = ClassItem::Range(lo, hi);
        if negate {
            self.exclude.push(item);
        } else {
            self.include.push(item);
        }
    }

    pub fn add_table(&mut self, table: &'static [(char, char)], negate: bool) {
        let item = ClassItem::Table(table);
        if negate {
            self.exclude.push(item);
        } else {
            self.include.push(item);
        }
    }

    pub fn add_predicate(&mut self, name: &'static str, f: fn(char) -> bool, negate: bool) {
        let item = ClassItem::Predicate(name, f);
        if negate {
            self.exclude.push(item);
        } else {
            self.include.push(item);
        }
    }

    /// Merge another class into this one. When `negate` is set, the other
    /// class's include and exclude lists are swapped before merging.
    pub fn add_class(&mut self, other: RuneClass, negate: bool) {
        let (other_inc, other_exc) = if negate {
            (other.exclude, other.include)
        } else {
            (other.include, other.exclude)
        };
        self.include.extend(other_inc);
        self.exclude.extend(other_exc);
    }

    /// Semantics of `matches`: compute the case-folded forms (if
    /// `ignore_case`), then check inclusion before exclusion.
    pub fn matches(&self, r: char) -> bool {
        let (upper, lower) = if self.ignore_case {
            (simple_fold_upper(r), simple_fold_lower(r))
        } else {
            (r, r)
        };

        let included = if self.include.is_empty() {
            true
        } else {
            self.include.iter().any(|item| {
                item.matches(r) || (self.ignore_case && (item.matches(upper) || item.matches(lower)))
            })
        };
        if !included {
            return false;
        }
        !self.exclude.iter().any(|item| {
            item.matches(r) || (self.ignore_case && (item.matches(upper) || item.matches(lower)))
        })
    }
}

fn simple_fold_upper(r: char) -> char {
    r.to_uppercase().next().unwrap_or(r)
}

fn simple_fold_lower(r: char) -> char {
    r.to_lowercase().next().unwrap_or(r)
}

/// ASCII POSIX classes, as per the "ASCII character classes" table on the
/// RE2 syntax page. Grounded on `original_source/sre2/ascii.go`'s
/// `posix_groups`.
pub fn ascii_class(name: &str) -> Option<&'static [(char, char)]> {
    static ALNUM: &[(char, char)] = &[('0', '9'), ('A', 'Z'), ('a', 'z')];
    static ALPHA: &[(char, char)] = &[('A', 'Z'), ('a', 'z')];
    static ASCII: &[(char, char)] = &[('\u{0}', '\u{7f}')];
    static BLANK: &[(char, char)] = &[('\t', '\t'), (' ', ' ')];
    static CNTRL: &[(char, char)] = &[('\u{0}', '\u{1f}'), ('\u{7f}', '\u{7f}')];
    static DIGIT: &[(char, char)] = &[('0', '9')];
    static GRAPH: &[(char, char)] = &[('!', '~')];
    static LOWER: &[(char, char)] = &[('a', 'z')];
    static PRINT: &[(char, char)] = &[(' ', '~')];
    static PUNCT: &[(char, char)] = &[('!', '/'), (':', '@'), ('[', '`'), ('{', '~')];
    static SPACE: &[(char, char)] = &[('\t', '\r'), (' ', ' ')];
    static UPPER: &[(char, char)] = &[('A', 'Z')];
    static WORD: &[(char, char)] = &[('0', '9'), ('A', 'Z'), ('_', '_'), ('a', 'z')];
    static XDIGIT: &[(char, char)] = &[('0', '9'), ('A', 'F'), ('a', 'f')];

    Some(match name {
        "alnum" => ALNUM,
        "alpha" => ALPHA,
        "ascii" => ASCII,
        "blank" => BLANK,
        "cntrl" => CNTRL,
        "digit" => DIGIT,
        "graph" => GRAPH,
        "lower" => LOWER,
        "print" => PRINT,
        "punct" => PUNCT,
        "space" => SPACE,
        "upper" => UPPER,
        "word" => WORD,
        "xdigit" => XDIGIT,
        _ => return None,
    })
}

/// Perl classes `\d \s \w` (and their negations `\D \S \W`), as unqualified
/// names (without the backslash).
pub fn perl_class(name: char) -> Option<&'static [(char, char)]> {
    match name {
        'd' | 'D' => ascii_class("digit"),
        'w' | 'W' => ascii_class("word"),
        's' | 'S' => {
            static SPACE: &[(char, char)] = &[('\t', '\n'), ('\x0c', '\r'), (' ', ' ')];
            Some(SPACE)
        }
        _ => None,
    }
}

type CatFn = fn(char) -> bool;

fn category_fn(name: &str) -> Option<CatFn> {
    Some(match name {
        "Lu" => |c: char| c.is_letter_uppercase(),
        "Ll" => |c: char| c.is_letter_lowercase(),
        "Lt" => |c: char| c.is_letter_titlecase(),
        "Lm" => |c: char| c.is_letter_modifier(),
        "Lo" => |c: char| c.is_letter_other(),
        "Mn" => |c: char| c.is_mark_nonspacing(),
        "Mc" => |c: char| c.is_mark_spacing_combining(),
        "Me" => |c: char| c.is_mark_enclosing(),
        "Nd" => |c: char| c.is_number_decimal_digit(),
        "Nl" => |c: char| c.is_number_letter(),
        "No" => |c: char| c.is_number_other(),
        "Pc" => |c: char| c.is_punctuation_connector(),
        "Pd" => |c: char| c.is_punctuation_dash(),
        "Ps" => |c: char| c.is_punctuation_open(),
        "Pe" => |c: char| c.is_punctuation_close(),
        "Pi" => |c: char| c.is_punctuation_initial_quote(),
        "Pf" => |c: char| c.is_punctuation_final_quote(),
        "Po" => |c: char| c.is_punctuation_other(),
        "Sm" => |c: char| c.is_symbol_math(),
        "Sc" => |c: char| c.is_symbol_currency(),
        "Sk" => |c: char| c.is_symbol_modifier(),
        "So" => |c: char| c.is_symbol_other(),
        "Zs" => |c: char| c.is_separator_space(),
        "Zl" => |c: char| c.is_separator_line(),
        "Zp" => |c: char| c.is_separator_paragraph(),
        "Cc" => |c: char| c.is_other_control(),
        "Cf" => |c: char| c.is_other_format(),
        "Co" => |c: char| c.is_other_private_use(),
        // Rust's `char` type can never hold a surrogate code point, so this
        // category is always empty for any value the compiler lets us see.
        "Cs" => |_c: char| false,
        _ => return None,
    })
}

/// Resolve a single-letter shorthand (e.g. `N`) to the union of every
/// two-letter category beginning with that letter (`Nd`, `Nl`, `No`).
fn category_union(letter: char) -> Option<CatFn> {
    // There is no way to build a dynamic closure and keep a `fn` pointer, so
    // the small set of top-level categories is spelled out explicitly.
    Some(match letter {
        'L' => |c: char| {
            c.is_letter_uppercase()
                || c.is_letter_lowercase()
                || c.is_letter_titlecase()
                || c.is_letter_modifier()
                || c.is_letter_other()
        },
        'M' => |c: char| {
            c.is_mark_nonspacing() || c.is_mark_spacing_combining() || c.is_mark_enclosing()
        },
        'N' => |c: char| {
            c.is_number_decimal_digit() || c.is_number_letter() || c.is_number_other()
        },
        'P' => |c: char| {
            c.is_punctuation_connector()
                || c.is_punctuation_dash()
                || c.is_punctuation_open()
                || c.is_punctuation_close()
                || c.is_punctuation_initial_quote()
                || c.is_punctuation_final_quote()
                || c.is_punctuation_other()
        },
        'S' => |c: char| {
            c.is_symbol_math() || c.is_symbol_currency() || c.is_symbol_modifier() || c.is_symbol_other()
        },
        'Z' => |c: char| c.is_separator_space() || c.is_separator_line() || c.is_separator_paragraph(),
        'C' => |c: char| {
            c.is_other_control() || c.is_other_format() || c.is_other_private_use()
        },
        _ => return None,
    })
}

/// A small built-in table of scripts and boolean properties, covering the
/// common cases a complete implementation would otherwise vendor the whole
/// Unicode Character Database for. Not exhaustive: see SPEC_FULL.md.
static SCRIPTS: Lazy<Vec<(&'static str, &'static [(char, char)])>> = Lazy::new(|| {
    vec![
        ("Latin", &[('A', 'Z'), ('a', 'z'), ('\u{80}', '\u{24f}')][..]),
        ("Greek", &[('\u{370}', '\u{3ff}'), ('\u{1f00}', '\u{1fff}')][..]),
        ("Cyrillic", &[('\u{400}', '\u{4ff}')][..]),
        ("Han", &[('\u{2e80}', '\u{2fdf}'), ('\u{3400}', '\u{4dbf}'), ('\u{4e00}', '\u{9fff}')][..]),
        ("Hiragana", &[('\u{3040}', '\u{309f}')][..]),
        ("Katakana", &[('\u{30a0}', '\u{30ff}')][..]),
        ("Arabic", &[('\u{600}', '\u{6ff}')][..]),
        ("Hebrew", &[('\u{590}', '\u{5ff}')][..]),
    ]
});

fn script_table(name: &str) -> Option<&'static [(char, char)]> {
    SCRIPTS.iter().find(|&&(n, _)| n == name).map(|&(_, t)| t)
}

fn property_fn(name: &str) -> Option<CatFn> {
    Some(match name {
        "Alphabetic" => char::is_alphabetic,
        "White_Space" => char::is_whitespace,
        "Uppercase" => char::is_uppercase,
        "Lowercase" => char::is_lowercase,
        _ => return None,
    })
}

/// Resolve a `\p{Name}`/`\pX` Unicode class name: single-letter shorthands
/// union every category beginning with that letter; multi-character names
/// are looked up across categories, properties, and scripts.
pub fn unicode_class(name: &str) -> Option<RuneClass> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.clone().next()) {
        if let Some(f) = category_union(c) {
            let mut class = RuneClass::new();
            class.add_predicate("category-union", f, false);
            return Some(class);
        }
    }
    if let Some(f) = category_fn(name) {
        let mut class = RuneClass::new();
        class.add_predicate("category", f, false);
        return Some(class);
    }
    if let Some(f) = property_fn(name) {
        let mut class = RuneClass::new();
        class.add_predicate("property", f, false);
        return Some(class);
    }
    if let Some(table) = script_table(name) {
        let mut class = RuneClass::new();
        class.add_table(table, false);
        return Some(class);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_class_matches_everything() {
        let c = RuneClass::new();
        // An empty include list means "match everything".
        assert!(c.matches('a'));
    }

    #[test]
    fn exclusion_wins_over_inclusion() {
        let mut c = RuneClass::new();
        c.add_rune_range('a', 'z', false);
        c.add_rune('q', true);
        assert!(c.matches('a'));
        assert!(!c.matches('q'));
    }

    #[test]
    fn ignore_case_checks_both_folds() {
        let mut c = RuneClass::new();
        c.add_rune('a', false);
        let c = c.with_ignore_case();
        assert!(c.matches('a'));
        assert!(c.matches('A'));
        assert!(!c.matches('b'));
    }

    #[test]
    fn ascii_classes_known() {
        assert!(ascii_class("digit").is_some());
        assert!(ascii_class("bogus").is_none());
    }

    #[test]
    fn unicode_category_union_by_letter() {
        let class = unicode_class("N").unwrap();
        assert!(class.matches('3'));
        assert!(class.matches('〩'));
        assert!(!class.matches('a'));
    }
}
