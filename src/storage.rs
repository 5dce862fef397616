use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    primitives::ByteStream,
    Client as S3Client,
};

use crate::config::AppConfig;

/// Upload seam for generated PDFs, signature images and company logos.
/// Returns the public URL that gets persisted on the owning record. Failures
/// are terminal for the request; nothing here retries.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String>;
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base: String,
}

impl S3Storage {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let region = Region::new(config.aws_region.clone());
        let region_provider = RegionProviderChain::first_try(Some(region))
            .or_default_provider()
            .or_else("us-east-1");

        #[allow(deprecated)]
        let mut loader = aws_config::from_env().region(region_provider);

        if let Some(endpoint) = &config.aws_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) = (
            config.aws_access_key_id.clone(),
            config.aws_secret_access_key.clone(),
        ) {
            let credentials = Credentials::new(access_key, secret_key, None, None, "static");
            loader = loader.credentials_provider(credentials);
        }

        let base_config = loader.load().await;
        let s3_config = S3ConfigBuilder::from(&base_config)
            .force_path_style(true)
            .build();

        let public_base = match (&config.public_storage_url, &config.aws_endpoint_url) {
            (Some(base), _) => base.trim_end_matches('/').to_string(),
            (None, Some(endpoint)) => {
                format!("{}/{}", endpoint.trim_end_matches('/'), config.s3_bucket)
            }
            (None, None) => format!(
                "https://{}.s3.{}.amazonaws.com",
                config.s3_bucket, config.aws_region
            ),
        };

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
            public_base,
        })
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(filename)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .context("failed to upload object to S3")?;

        Ok(format!("{}/{}", self.public_base, filename))
    }
}
