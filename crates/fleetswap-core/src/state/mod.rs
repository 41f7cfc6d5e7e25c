//! Persisted role ownership and environment locking.

pub mod ledger;
pub mod lock;
pub mod store;

pub use ledger::{EnvironmentRoles, RoleEntry, RoleLedger};
pub use lock::EnvironmentLock;
pub use store::LedgerStore;
