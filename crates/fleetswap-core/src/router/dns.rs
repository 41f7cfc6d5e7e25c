use futures::future::try_join_all;
use tracing::info;

use super::TrafficRouter;
use crate::config::QA_SENTINEL;
use crate::error::Result;
use crate::provider::{LoadBalancer, RecordChange};
use crate::types::Fleet;
use crate::wait;

/// A QA slot bound to one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaBinding {
    pub slot: usize,
    pub instance: String,
    pub address: String,
    pub names: Vec<String>,
}

impl TrafficRouter {
    async fn commit(&self, changes: Vec<RecordChange>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let zone_id = self.cloud.dns.zone_id(&self.env.zone).await?;
        self.cloud.dns.commit(&zone_id, &changes).await?;
        Ok(())
    }

    fn cname(&self, name: &str, value: &str) -> RecordChange {
        RecordChange::UpsertCname {
            name: name.to_string(),
            value: value.to_string(),
            ttl: self.env.ttl_seconds,
        }
    }

    /// Point slot N's QA names at the N-th member (ordered by instance id).
    pub async fn link_qa_urls(&self, fleet: &Fleet) -> Result<Vec<QaBinding>> {
        let members = fleet.members();
        info!(fleet = %fleet.name, count = members.len(), "waiting on public addresses for QA names");
        let compute = self.cloud.compute.as_ref();
        let policy = self.policy;
        let instances = try_join_all(
            members
                .iter()
                .map(|id| wait::instance_has_address(compute, policy, id)),
        )
        .await?;

        let mut bindings = Vec::with_capacity(instances.len());
        for (index, instance) in instances.iter().enumerate() {
            let slot = index + 1;
            let address = instance.public_address().unwrap_or_default().to_string();
            bindings.push(QaBinding {
                slot,
                instance: instance.id.clone(),
                names: self.env.qa_urls_for_slot(slot),
                address,
            });
        }

        let changes = bindings
            .iter()
            .flat_map(|b| b.names.iter().map(|name| self.cname(name, &b.address)))
            .collect();
        self.commit(changes).await?;
        for binding in &bindings {
            info!(slot = binding.slot, instance = %binding.instance, address = %binding.address, "QA names linked");
        }
        Ok(bindings)
    }

    /// Reset the QA names of every slot `fleet` used to the sentinel.
    pub async fn unlink_qa_urls(&self, fleet: &Fleet) -> Result<()> {
        self.unlink_qa_slots(fleet.members().len()).await
    }

    pub async fn unlink_qa_slots(&self, slots: usize) -> Result<()> {
        info!(slots, "un-linking QA names");
        let changes = (1..=slots)
            .flat_map(|slot| self.env.qa_urls_for_slot(slot))
            .map(|name| self.cname(&name, QA_SENTINEL))
            .collect();
        self.commit(changes).await
    }

    /// Repoint the apex and production names at the balancer in one batch.
    pub async fn link_base_urls(&self, balancer: &LoadBalancer) -> Result<()> {
        info!(base_url = %self.env.base_url, balancer = %balancer.dns_name, "linking base URLs");
        let mut changes = vec![RecordChange::UpsertAlias {
            name: self.env.base_url.clone(),
            target_dns: balancer.dns_name.clone(),
            target_zone_id: balancer.hosted_zone_id.clone(),
            evaluate_target_health: false,
        }];
        changes.extend(
            self.env
                .urls
                .iter()
                .map(|url| self.cname(url, &balancer.dns_name)),
        );
        self.commit(changes).await
    }

    /// Point plain CNAMEs at `target`.
    pub async fn bind_names(&self, names: &[String], target: &str) -> Result<()> {
        let changes = names.iter().map(|name| self.cname(name, target)).collect();
        self.commit(changes).await
    }
}
