//! Incremental synchronization of documentation artifacts.
//!
//! A run enumerates the source tree, fingerprints every file, and
//! partitions files against the previous run's records:
//!
//! | Partition | Condition                       | Action                      |
//! |-----------|---------------------------------|-----------------------------|
//! | new       | no record                       | analyze, create artifacts   |
//! | changed   | fingerprint differs             | analyze, update what differs|
//! | unchanged | fingerprint matches             | nothing                     |
//! | removed   | record exists, file absent      | delete its artifacts        |
//!
//! A first run is the same code path with empty state.

mod analyze;
mod engine;
mod fingerprint;
mod source;
mod state;
mod store;

pub use analyze::{analyze_file, FileAnalysis};
pub use engine::{
    CancellationToken, Operation, OperationKind, OperationRecord, RunCounts, RunReport, SourceFile,
    SyncEngine, SyncPlan,
};
pub use fingerprint::fingerprint;
pub use source::{Enumeration, FsSourceTree, SourceTree};
pub use state::{JsonStateFile, MemoryState, StateStore, SyncRecord, SyncState, STATE_VERSION};
pub use store::{ArtifactStore, FsArtifactStore, MemoryStore, StoreCall};
