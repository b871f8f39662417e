//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock or in-memory adapters.  All tests run on the host with no
//! real GPIO or mail relay.

mod controller_tests;
mod hub_tests;
mod mock_hw;
mod watcher_tests;
