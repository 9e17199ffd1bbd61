//! Portico service layer — the registry of callable endpoints and the
//! dispatcher that turns one inbound envelope into one outbound envelope.
//!
//! Modules supply [`ServiceMap`] fragments at startup; the merged map is
//! immutable once the [`Dispatcher`] is built and is read concurrently by
//! every call without locking.

pub mod dispatch;
pub mod endpoint;
pub mod registry;

pub use dispatch::{CallContext, Dispatcher};
pub use endpoint::Endpoint;
pub use registry::{RegistryError, ServiceMap};
