//! Scenario tests that drive the whole face through its event loop with a
//! scripted host and an in-memory companion.
