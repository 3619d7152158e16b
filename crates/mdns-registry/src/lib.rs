#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

//! Service registry and responder loop for a Multicast DNS / DNS-SD
//! responder: builds per-service answer messages, announces and
//! answers them over the multicast group, and serves withdrawal
//! ("goodbye") on shutdown.

pub mod descriptor;
pub mod registry;
pub mod responder;

pub use descriptor::ServiceDescriptor;
pub use registry::Handle as RegistryHandle;
