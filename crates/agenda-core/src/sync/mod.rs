//! Offline queue synchronization.

mod connectivity;
mod engine;
mod http;
mod remote;

pub use connectivity::ConnectivityMonitor;
pub use engine::{PassReport, SyncEngine};
pub use http::{HttpCollaborator, HttpSetupError};
pub use remote::{RemoteCollaborator, RemoteError, RemoteResult};
