//! In-memory adapters for tests and local runs without a database.

mod callback_records;
mod directory;
mod entitlement_store;
mod order_repository;
mod recorders;

pub use callback_records::InMemoryCallbackRecords;
pub use directory::{InMemoryAccountDirectory, InMemoryPackageCatalog};
pub use entitlement_store::InMemoryEntitlementStore;
pub use order_repository::InMemoryOrderRepository;
pub use recorders::{RecordingAuditLog, RecordingNotifier};
