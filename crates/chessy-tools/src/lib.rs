//! Shared plumbing for the chessy command line tools.

pub mod cli;
pub mod history;
pub mod io;
