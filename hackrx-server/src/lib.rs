#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! hackrx-server

pub mod app_state;
pub mod docs;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod router;
pub mod routes;
pub mod settings;
pub mod setups;
pub mod shutdown;
pub mod store;
pub mod tracer;
pub mod worker;

#[cfg(test)]
pub mod test_utils;
