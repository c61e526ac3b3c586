// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Shared test setup. `cargo test -- --nocapture` with `RUST_LOG=trace` then
//! shows the compiler/cleanup tracing from `src/compile.rs` and
//! `src/cleanup.rs`.

/// Idempotent across repeated calls within one test binary; each `#[test]`
/// runs on its own thread, so this must be safe to call concurrently.
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
