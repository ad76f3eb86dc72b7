//! Handlers that see the user's prompt before the agent does

mod auto_continue;

pub use auto_continue::AutoContinueHandler;
