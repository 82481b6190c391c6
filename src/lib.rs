#![no_std]

pub mod firmware;

// NOTE: this binary crate cannot run `cargo test` directly (embassy /
// cortex-m-rt pull in ARM-only assembly). All safety-critical logic lives
// in `marine-ess-core`, which has no such dependency and runs its full
// suite on the host; see that crate's `src/lib.rs` for the split.
