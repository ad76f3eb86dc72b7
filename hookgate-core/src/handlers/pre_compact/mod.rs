//! Handlers that run before the agent compacts its context

mod workflow_snapshot;

pub use workflow_snapshot::WorkflowSnapshotHandler;
