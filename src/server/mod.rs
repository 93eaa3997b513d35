//! Server layer: the shared transport and the port-keyed registry.

pub mod instance;
pub mod registry;

pub use instance::{BroadcastReport, Server, SharedServer};
pub use registry::Registry;
