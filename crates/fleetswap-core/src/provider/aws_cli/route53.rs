use async_trait::async_trait;
use serde_json::{Value, json};

use super::{AwsCli, flag, items, text};
use crate::error::ProviderError;
use crate::provider::{DnsApi, ProviderResult, RecordChange};

const SERVICE: &str = "route53";

fn record_set(change: &RecordChange) -> Value {
    match change {
        RecordChange::UpsertAlias {
            name,
            target_dns,
            target_zone_id,
            evaluate_target_health,
        } => json!({
            "Name": name,
            "Type": "A",
            "AliasTarget": {
                "HostedZoneId": target_zone_id,
                "DNSName": target_dns,
                "EvaluateTargetHealth": evaluate_target_health,
            },
        }),
        RecordChange::UpsertCname { name, value, ttl } => json!({
            "Name": name,
            "Type": "CNAME",
            "TTL": ttl,
            "ResourceRecords": [{ "Value": value }],
        }),
    }
}

fn change_batch(changes: &[RecordChange]) -> Value {
    let changes: Vec<Value> = changes
        .iter()
        .map(|c| json!({ "Action": "UPSERT", "ResourceRecordSet": record_set(c) }))
        .collect();
    json!({ "Changes": changes })
}

#[async_trait]
impl DnsApi for AwsCli {
    async fn zone_id(&self, zone: &str) -> ProviderResult<String> {
        let response = self
            .call(
                SERVICE,
                "list-hosted-zones-by-name",
                flag("--dns-name", zone).to_vec(),
            )
            .await?;
        items(&response, "HostedZones")
            .iter()
            .filter(|z| text(z, "Name").as_deref() == Some(zone))
            .find_map(|z| text(z, "Id"))
            .map(|id| id.trim_start_matches("/hostedzone/").to_string())
            .ok_or_else(|| ProviderError::NotFound(format!("hosted zone {zone}")))
    }

    async fn commit(&self, zone_id: &str, changes: &[RecordChange]) -> ProviderResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut args = flag("--hosted-zone-id", zone_id).to_vec();
        args.extend(flag("--change-batch", change_batch(changes)));
        self.call(SERVICE, "change-resource-record-sets", args)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_one_batch_for_alias_and_cname() {
        let batch = change_batch(&[
            RecordChange::UpsertAlias {
                name: "shop.example.".to_string(),
                target_dns: "shop-live.elb.example.com".to_string(),
                target_zone_id: "ZELB".to_string(),
                evaluate_target_health: false,
            },
            RecordChange::UpsertCname {
                name: "www.shop.example.".to_string(),
                value: "shop-live.elb.example.com".to_string(),
                ttl: 60,
            },
        ]);
        let changes = batch["Changes"].as_array().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0]["Action"], "UPSERT");
        assert_eq!(changes[0]["ResourceRecordSet"]["Type"], "A");
        assert_eq!(changes[0]["ResourceRecordSet"]["AliasTarget"]["HostedZoneId"], "ZELB");
        assert_eq!(changes[1]["ResourceRecordSet"]["Type"], "CNAME");
        assert_eq!(changes[1]["ResourceRecordSet"]["TTL"], 60);
        assert_eq!(
            changes[1]["ResourceRecordSet"]["ResourceRecords"][0]["Value"],
            "shop-live.elb.example.com"
        );
    }
}
