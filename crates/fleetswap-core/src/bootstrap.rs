//! Rendering and publishing of instance bootstrap files.

use std::sync::Arc;

use tracing::info;

use crate::config::EnvironmentConfig;
use crate::error::Result;
use crate::naming::ResourceNames;
use crate::provider::ArtifactStore;
use crate::template;

/// Render every configured bootstrap file and upload it.
///
/// Returns the object keys written, in file-name order.
pub async fn publish_bootstrap(
    artifacts: &dyn ArtifactStore,
    env: &Arc<EnvironmentConfig>,
) -> Result<Vec<String>> {
    let Some(bootstrap) = &env.bootstrap else {
        info!("no bootstrap files configured");
        return Ok(Vec::new());
    };
    let names = ResourceNames::new(&env.project, &env.environment);
    let vars = env.template_variables();

    info!(environment = %env.environment, bucket = %bootstrap.bucket, "pushing bootstrap config");
    let mut keys = Vec::with_capacity(bootstrap.files.len());
    for (file, path) in &bootstrap.files {
        let contents = template::render_file(&env.resolve_path(path), &vars)?;
        let key = names.bootstrap_key(file);
        artifacts
            .put_object(&bootstrap.bucket, &key, contents.as_bytes(), &bootstrap.acl)
            .await?;
        info!(%key, "uploaded");
        keys.push(key);
    }
    Ok(keys)
}
