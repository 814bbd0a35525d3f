use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::config::{load_dotenv, optional_var, required_var};
use crate::{
    BucketSpec, ConfigError, ObjectInfo, ObjectStore, StoreError, StoreResult, UploadOptions,
};

/// S3-compatible endpoint settings
#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: String,
    /// Base for public object links; defaults to the endpoint
    pub public_base_url: String,
}

impl S3Config {
    /// Reads `S3_REGION`, `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY`,
    /// `S3_ENDPOINT_URL` and optionally `S3_PUBLIC_BASE_URL`
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        let endpoint_url = required_var("S3_ENDPOINT_URL")?;
        Ok(Self {
            region: required_var("S3_REGION")?,
            access_key_id: required_var("S3_ACCESS_KEY_ID")?,
            secret_access_key: required_var("S3_SECRET_ACCESS_KEY")?,
            public_base_url: optional_var("S3_PUBLIC_BASE_URL")
                .unwrap_or_else(|| endpoint_url.clone()),
            endpoint_url,
        })
    }
}

/// Object store over any S3-compatible service (AWS, MinIO, RustFS, R2).
///
/// S3 has no notion of a per-bucket MIME allow-list or size ceiling, so the
/// `BucketSpec` a bucket was created with is remembered and enforced on upload.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    public_base_url: String,
    specs: Arc<RwLock<HashMap<String, BucketSpec>>>,
}

impl S3ObjectStore {
    pub async fn new(config: S3Config) -> Self {
        let public_base_url = config.public_base_url.trim_end_matches('/').to_string();
        let client = Self::create_client(config).await;
        Self::from_client(client, public_base_url)
    }

    pub async fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(S3Config::from_env()?).await)
    }

    pub fn from_client<S: Into<String>>(client: Client, public_base_url: S) -> Self {
        Self {
            client,
            public_base_url: public_base_url.into(),
            specs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register the rules of a bucket that already exists
    pub fn with_bucket_spec(self, spec: BucketSpec) -> Self {
        self.specs.write().insert(spec.name.clone(), spec);
        self
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "interview-media",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint_url)
            .load()
            .await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build(),
        )
    }

    fn check_spec(&self, bucket: &str, body: &Bytes, options: &UploadOptions) -> StoreResult<()> {
        let specs = self.specs.read();
        let Some(spec) = specs.get(bucket) else {
            return Ok(());
        };
        if !spec.allows(&options.content_type) {
            return Err(StoreError::invalid(format!(
                "mime type {} is not supported",
                options.content_type
            )));
        }
        if body.len() as u64 > spec.file_size_limit {
            return Err(StoreError::invalid(format!(
                "object of {} bytes exceeds the maximum allowed size {}",
                body.len(),
                spec.file_size_limit
            )));
        }
        Ok(())
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> StoreError {
        StoreError::backend(err)
    }
}

fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "PublicRead",
            "Effect": "Allow",
            "Principal": "*",
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{}/*", bucket)],
        }]
    })
    .to_string()
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        let result = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        Ok(result
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> StoreResult<()> {
        self.client
            .create_bucket()
            .bucket(&spec.name)
            .send()
            .await
            .map_err(Self::map_aws_error)?;

        if spec.public {
            self.client
                .put_bucket_policy()
                .bucket(&spec.name)
                .policy(public_read_policy(&spec.name))
                .send()
                .await
                .map_err(Self::map_aws_error)?;
        }

        self.specs.write().insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: &UploadOptions,
    ) -> StoreResult<()> {
        self.check_spec(bucket, &body, options)?;

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(path)
            .content_type(&options.content_type)
            .cache_control(format!("max-age={}", options.cache_control))
            .body(AwsByteStream::from(body));

        if !options.upsert {
            request = request.if_none_match("*");
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err)
                if matches!(
                    err.code(),
                    Some("PreconditionFailed") | Some("ConditionalRequestConflict")
                ) =>
            {
                Err(StoreError::already_exists(path))
            }
            Err(err) => Err(Self::map_aws_error(err)),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let folder = prefix.trim_end_matches('/');
        let key_prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{}/", folder)
        };

        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let result = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(&key_prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(Self::map_aws_error)?;

            for object in result.contents() {
                let Some(key) = object.key() else { continue };
                let name = key.strip_prefix(&key_prefix).unwrap_or(key);
                let mut info = ObjectInfo::new(name);
                info.size = object.size().map(|s| s.max(0) as u64);
                info.updated_at = object.last_modified().map(|dt| dt.secs());
                objects.push(info);
            }

            match result.next_continuation_token() {
                Some(token) if result.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StoreResult<()> {
        let identifiers = paths
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(Self::map_aws_error)?;

        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(Self::map_aws_error)?;

        self.client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    async fn public_url(&self, bucket: &str, path: &str) -> StoreResult<String> {
        Ok(format!("{}/{}/{}", self.public_base_url, bucket, path))
    }

    async fn download(&self, bucket: &str, path: &str) -> StoreResult<Bytes> {
        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(path)
            .send()
            .await
            .map_err(|err| {
                if err.code() == Some("NoSuchKey") {
                    StoreError::not_found(path)
                } else {
                    Self::map_aws_error(err)
                }
            })?;

        let body = result.body.collect().await.map_err(Self::map_aws_error)?;
        Ok(body.into_bytes())
    }
}
