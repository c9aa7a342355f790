//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one end-to-end scenario
//! against the in-memory demo modules under `demos/`. Everything runs on
//! the host with no target hardware involved.

#[path = "../../demos/mod.rs"]
mod demos;

mod bring_up_tests;
mod delayed_response_tests;
mod isr_ingress_tests;
mod notification_tests;
mod request_response_tests;
