use async_trait::async_trait;

use super::{AwsCli, flag};
use crate::provider::{ArtifactStore, ProviderResult};

#[async_trait]
impl ArtifactStore for AwsCli {
    /// Streams `contents` through `aws s3 cp -`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        contents: &[u8],
        acl: &str,
    ) -> ProviderResult<()> {
        let mut args = vec!["-".to_string(), format!("s3://{bucket}/{key}")];
        args.extend(flag("--acl", acl));
        self.call_with_input("s3", "cp", args, contents).await?;
        Ok(())
    }
}
