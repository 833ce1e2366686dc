// src/session/mod.rs

pub mod error;
pub mod machine;
pub mod phase;
pub mod runtime;
pub mod snapshot;

pub use error::SessionError;
pub use machine::{Effect, Event, Workspace, WorkspaceView};
pub use phase::Phase;
pub use runtime::SessionRuntime;
pub use snapshot::SnapshotStore;
