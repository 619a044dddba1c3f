#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! hackrx-supervisor
//!
//! Launches the hackrx web server and worker, waits for whichever stops
//! first, stops the other and exits with the first one's status.

pub mod cli;
pub mod supervisor;

pub use supervisor::{Exit, ProcessSpec, Supervisor, SupervisorError};
