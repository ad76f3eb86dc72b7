//! Handlers that run when a sub-agent finishes

mod prompt_library;
mod validator_reminder;

pub use prompt_library::PromptLibraryHandler;
pub use validator_reminder::ValidatorReminderHandler;
