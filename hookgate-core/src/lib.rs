//! Hookgate core library exports

pub mod bootstrap;
pub mod daemon;
pub mod engine;
pub mod handlers;
pub mod harness;
