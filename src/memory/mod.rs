//! The address map and everything that reads or writes raw memory through it.
pub mod address;
pub mod embedded;
pub mod factory;
pub mod finalize;
pub mod handles;
pub mod keepalive;
pub mod pointer;
pub mod registry;
pub mod scalar;

pub use address::{compute_address, offset_argument};
pub use embedded::EmbeddedReferenceStore;
pub use factory::BufferFactory;
pub use finalize::{FinalizationCoordinator, Release};
pub use handles::{GcHandleKind, Handle, HandleTable};
pub use keepalive::KeepAliveTable;
pub use registry::{BufferRegistry, Registration, RegistrationMode};
