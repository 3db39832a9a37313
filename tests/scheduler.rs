//! Entry point for the end-to-end scheduler scenario tests; see
//! `scheduler/mod.rs` for the shared scaffolding and one module per
//! scenario.

mod scheduler;
