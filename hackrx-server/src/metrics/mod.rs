//! Metrics capture and Prometheus recorder.

pub mod prom;
