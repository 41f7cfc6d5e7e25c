//! Role ownership for one environment.
//!
//! The ledger decides which fleet holds a role. Every change is persisted to
//! the ledger first and then mirrored to the `type` tag of the scaling group
//! so operators see the same picture in the console.

use tracing::{info, warn};

use crate::error::{DeployError, Result};
use crate::naming::FleetTags;
use crate::state::{LedgerStore, RoleEntry, RoleLedger};
use crate::types::{Fleet, Role};

#[derive(Debug)]
pub struct RoleBook {
    store: LedgerStore,
    ledger: RoleLedger,
    tags: FleetTags,
}

impl RoleBook {
    /// Load the ledger and reconcile it with the cloud.
    ///
    /// An environment without ledger record is adopted from its tags. Entries
    /// whose fleet disappeared are dropped, and drifted tags are rewritten.
    pub async fn open(store: LedgerStore, tags: FleetTags) -> Result<Self> {
        let ledger = store.load()?;
        let mut book = Self {
            store,
            ledger,
            tags,
        };
        book.reconcile().await?;
        Ok(book)
    }

    pub fn environment(&self) -> &str {
        self.tags.environment()
    }

    pub fn tags(&self) -> &FleetTags {
        &self.tags
    }

    async fn reconcile(&mut self) -> Result<()> {
        let environment = self.environment().to_string();
        let mut changed = false;

        if !self.ledger.knows(&environment) {
            self.ledger.register(&environment);
            for role in Role::ALL {
                if let Some(fleet) = self.tags.find_by_role(role).await? {
                    info!(
                        environment = %environment,
                        fleet = %fleet.name,
                        role = %role,
                        "adopting role from tags"
                    );
                    self.ledger.assign(&environment, role, &fleet.name)?;
                }
            }
            changed = true;
        }

        for (role, entry) in self.ledger.roles(&environment) {
            match self.tags.describe(&entry.fleet).await? {
                None => {
                    warn!(
                        environment = %environment,
                        fleet = %entry.fleet,
                        role = %role,
                        "fleet no longer exists, dropping it from the ledger"
                    );
                    self.ledger.release(&environment, role);
                    changed = true;
                }
                Some(fleet) if fleet.tagged_role != Some(role) => {
                    warn!(
                        environment = %environment,
                        fleet = %fleet.name,
                        role = %role,
                        tagged = ?fleet.tagged_role,
                        "role tag drifted, rewriting it"
                    );
                    self.tags.tag_role(&fleet.name, role).await?;
                }
                Some(_) => {}
            }
        }

        if changed {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.ledger)?;
        Ok(())
    }

    pub fn holder(&self, role: Role) -> Option<&str> {
        self.ledger.holder(self.environment(), role)
    }

    pub fn role_of(&self, fleet: &str) -> Option<Role> {
        self.ledger.role_of(self.environment(), fleet)
    }

    pub fn entries(&self) -> Vec<(Role, RoleEntry)> {
        self.ledger.roles(self.environment())
    }

    /// Current state of the fleet holding `role`.
    pub async fn fleet(&self, role: Role) -> Result<Option<Fleet>> {
        let Some(name) = self.holder(role) else {
            return Ok(None);
        };
        match self.tags.describe(name).await? {
            Some(fleet) => Ok(Some(fleet)),
            None => Err(DeployError::integrity(format!(
                "{} fleet {} recorded for '{}' does not exist",
                role,
                name,
                self.environment()
            ))),
        }
    }

    /// Give `role` to `fleet` and mirror it to the tag.
    pub async fn assign(&mut self, role: Role, fleet: &str) -> Result<()> {
        let environment = self.environment().to_string();
        self.ledger.assign(&environment, role, fleet)?;
        self.persist()?;
        info!(environment = %environment, fleet, role = %role, "role assigned");
        self.tags.tag_role(fleet, role).await
    }

    /// Move the holder of `from` to `to`; returns the fleet moved, if any.
    pub async fn transition(&mut self, from: Role, to: Role) -> Result<Option<String>> {
        let Some(fleet) = self.holder(from).map(str::to_string) else {
            return Ok(None);
        };
        self.assign(to, &fleet).await?;
        Ok(Some(fleet))
    }

    /// Forget the holder of `role` (its fleet is gone).
    pub fn release(&mut self, role: Role) -> Result<Option<String>> {
        let environment = self.environment().to_string();
        let released = self.ledger.release(&environment, role);
        if released.is_some() {
            self.persist()?;
        }
        Ok(released)
    }
}
