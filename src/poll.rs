//! Remote sampling: discovery, the ssh transport, process-table parsing and
//! the per-cycle runner that ties them together.

pub mod command;
pub mod cycle;
pub mod discovery;
pub mod executor;
pub mod parser;
pub mod sample;

pub use cycle::CycleRunner;
pub use discovery::discover_nodes;
pub use executor::{RemoteExecutor, SshExecutor};
pub use sample::Sample;
