//! Listener layer: the owner-facing handle and outgoing value encoding.

pub mod encoding;
pub mod handle;

pub use encoding::{Atom, encode};
pub use handle::Listener;
