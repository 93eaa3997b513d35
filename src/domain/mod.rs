//! Domain layer: identifiers, the open-connection set, and server events.
//!
//! These types are shared by the transport (`ws`), the server and registry
//! (`server`), and the owner-facing handle (`listener`).

pub mod connection_id;
pub mod connection_set;
pub mod port;
pub mod server_event;

pub use connection_id::{ConnectionId, IdAllocator, ListenerId};
pub use connection_set::{ConnectionEntry, ConnectionSet};
pub use port::Port;
pub use server_event::{EventSink, NullSink, ServerEvent};
