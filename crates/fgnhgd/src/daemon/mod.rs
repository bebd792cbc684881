//! The single-threaded orchestration loop.

mod orchdaemon;

pub use orchdaemon::OrchDaemon;
