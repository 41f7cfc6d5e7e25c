//! Backend driving the `aws` command-line tool.
//!
//! Every call runs `aws <service> <operation> ... --output json` and maps the
//! JSON response into provider types. Failures are classified from the error
//! code the tool prints on stderr.

mod cloudwatch;
mod compute;
mod elb;
mod route53;
mod s3;
mod scaling;

use serde_json::Value;
use tracing::debug;

use super::process::run_program;
use super::{CommandOutput, ProviderResult};
use crate::config::EnvironmentConfig;
use crate::error::ProviderError;

/// Error codes that clear up when the call is repeated.
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "RequestLimitExceeded",
    "Rate exceeded",
    "ServiceUnavailable",
    "RequestTimeout",
    "PriorRequestNotComplete",
];

const NOT_FOUND_MARKERS: &[&str] = &["NotFound", "does not exist", "not found"];

/// Cloud collaborator backed by the `aws` CLI.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    region: String,
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            program: "aws".to_string(),
            region: region.into(),
            profile,
        }
    }

    pub fn from_environment(env: &EnvironmentConfig) -> Self {
        Self::new(env.region.clone(), env.profile.clone())
    }

    /// Use a different executable (a wrapper script, or a stub in tests).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command_args(&self, service: &str, operation: &str, args: Vec<String>) -> Vec<String> {
        let mut full = vec![service.to_string(), operation.to_string()];
        full.extend(args);
        full.push("--region".to_string());
        full.push(self.region.clone());
        if let Some(profile) = &self.profile {
            full.push("--profile".to_string());
            full.push(profile.clone());
        }
        full.push("--output".to_string());
        full.push("json".to_string());
        full
    }

    async fn call(&self, service: &str, operation: &str, args: Vec<String>) -> ProviderResult<Value> {
        self.invoke(service, operation, args, None).await
    }

    async fn call_with_input(
        &self,
        service: &str,
        operation: &str,
        args: Vec<String>,
        input: &[u8],
    ) -> ProviderResult<Value> {
        self.invoke(service, operation, args, Some(input)).await
    }

    async fn invoke(
        &self,
        service: &str,
        operation: &str,
        args: Vec<String>,
        input: Option<&[u8]>,
    ) -> ProviderResult<Value> {
        debug!(service, operation, "aws call");
        let args = self.command_args(service, operation, args);
        let output = run_program(&self.program, &args, input).await?;
        if !output.success() {
            return Err(classify_failure(&format!("{service} {operation}"), &output));
        }
        Ok(parse_output(&output.stdout))
    }
}

fn parse_output(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

fn classify_failure(call: &str, output: &CommandOutput) -> ProviderError {
    let detail = output.stderr.trim();
    let message = format!("{call} failed (exit {}): {detail}", output.exit_code);
    if TRANSIENT_CODES.iter().any(|code| detail.contains(code)) {
        ProviderError::Transient(message)
    } else if NOT_FOUND_MARKERS.iter().any(|marker| detail.contains(marker)) {
        ProviderError::NotFound(message)
    } else {
        ProviderError::Api(message)
    }
}

/// Treat a `NotFound` failure as an absent result.
fn absent_if_missing<T>(result: ProviderResult<T>) -> ProviderResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ProviderError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(value: &Value, key: &str) -> u32 {
    value
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// String field `field` of every object in array `key`.
fn texts(value: &Value, key: &str, field: &str) -> Vec<String> {
    items(value, key)
        .iter()
        .filter_map(|item| text(item, field))
        .collect()
}

/// `Tags` array of `{Key, Value}` objects as pairs.
fn tag_pairs(value: &Value) -> Vec<(String, String)> {
    items(value, "Tags")
        .iter()
        .filter_map(|t| Some((text(t, "Key")?, t.get("Value")?.as_str()?.to_string())))
        .collect()
}

fn flag(name: &str, value: impl ToString) -> [String; 2] {
    [name.to_string(), value.to_string()]
}
