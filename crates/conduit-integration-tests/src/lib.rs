//! Test-only crate: cross-crate scenario and property tests live in
//! `tests/`.
