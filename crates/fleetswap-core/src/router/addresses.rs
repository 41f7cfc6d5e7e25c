use futures::future::try_join_all;
use tracing::info;

use super::TrafficRouter;
use crate::error::{DeployError, Result};
use crate::types::Fleet;
use crate::wait;

impl TrafficRouter {
    /// Give each running member one free elastic address.
    ///
    /// Members that already hold an address keep it. Free addresses are
    /// consumed in member order; if there are fewer than needed nothing is
    /// associated.
    pub async fn assign_elastic_addresses(&self, fleet: &Fleet) -> Result<Vec<(String, String)>> {
        let members = fleet.members();
        let addresses = self.cloud.compute.describe_addresses().await?;

        let pending: Vec<String> = members
            .into_iter()
            .filter(|id| {
                !addresses
                    .iter()
                    .any(|a| a.instance_id.as_deref() == Some(id.as_str()))
            })
            .collect();
        let free: Vec<_> = addresses.into_iter().filter(|a| a.is_free()).collect();
        info!(fleet = %fleet.name, needed = pending.len(), free = free.len(), "assigning elastic addresses");
        if free.len() < pending.len() {
            return Err(DeployError::InsufficientAddresses {
                needed: pending.len(),
                available: free.len(),
            });
        }

        let compute = self.cloud.compute.as_ref();
        let policy = self.policy;
        try_join_all(
            pending
                .iter()
                .map(|id| wait::instance_running(compute, policy, id)),
        )
        .await?;

        let mut assigned = Vec::with_capacity(pending.len());
        for (id, address) in pending.into_iter().zip(free) {
            compute.associate_address(&id, &address).await?;
            info!(instance = %id, address = %address.public_ip, "address assigned");
            assigned.push((id, address.public_ip));
        }
        Ok(assigned)
    }
}
