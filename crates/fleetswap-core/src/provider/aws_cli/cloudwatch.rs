use async_trait::async_trait;

use super::{AwsCli, flag};
use crate::provider::{AlarmApi, AlarmSpec, ProviderResult};

const SERVICE: &str = "cloudwatch";

fn alarm_args(spec: &AlarmSpec) -> Vec<String> {
    let mut args = Vec::new();
    args.extend(flag("--alarm-name", &spec.name));
    args.extend(flag("--namespace", &spec.namespace));
    args.extend(flag("--metric-name", &spec.metric));
    args.extend(flag("--statistic", &spec.statistic));
    args.extend(flag("--comparison-operator", spec.comparison.as_operator()));
    args.extend(flag("--threshold", spec.threshold));
    args.extend(flag("--period", spec.period_seconds));
    args.extend(flag("--evaluation-periods", spec.evaluation_periods));
    if !spec.actions.is_empty() {
        args.push("--alarm-actions".to_string());
        args.extend(spec.actions.iter().cloned());
    }
    if !spec.dimensions.is_empty() {
        args.push("--dimensions".to_string());
        args.extend(
            spec.dimensions
                .iter()
                .map(|(name, value)| format!("Name={name},Value={value}")),
        );
    }
    args
}

#[async_trait]
impl AlarmApi for AwsCli {
    async fn put_alarm(&self, spec: &AlarmSpec) -> ProviderResult<()> {
        self.call(SERVICE, "put-metric-alarm", alarm_args(spec))
            .await?;
        Ok(())
    }

    async fn delete_alarms(&self, names: &[String]) -> ProviderResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut args = vec!["--alarm-names".to_string()];
        args.extend(names.iter().cloned());
        self.call(SERVICE, "delete-alarms", args).await?;
        Ok(())
    }
}
