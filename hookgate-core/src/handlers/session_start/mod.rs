//! Handlers that run when a session starts or resumes

mod workflow_restore;

pub use workflow_restore::WorkflowRestoreHandler;
