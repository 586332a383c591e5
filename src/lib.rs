//! Library crate for netprobe-rs: a bounded worker pool and the HTTP/TCP/DNS probe it runs.
pub mod logging;
pub mod pool;
pub mod probe;
pub mod report;
pub mod scope;
pub mod targets;
pub mod tls;
pub mod types;
