use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{load_dotenv, required_var};
use crate::store::join_path;
use crate::{
    BucketSpec, ConfigError, ObjectInfo, ObjectStore, StoreError, StoreResult, UploadOptions,
};

const PAGE_SIZE: usize = 1000;

/// Connection settings for a Supabase project
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Service-role or anon key sent as bearer token and `apikey`
    pub api_key: String,
}

impl SupabaseConfig {
    pub fn new<U: Into<String>, K: Into<String>>(url: U, api_key: K) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Reads `SUPABASE_URL` and `SUPABASE_SERVICE_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Ok(Self::new(
            required_var("SUPABASE_URL")?,
            required_var("SUPABASE_SERVICE_KEY")?,
        ))
    }
}

/// Object store backed by the Supabase Storage REST API
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    config: SupabaseConfig,
}

#[derive(Debug, Deserialize)]
struct BucketEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateBucketBody<'a> {
    id: &'a str,
    name: &'a str,
    public: bool,
    allowed_mime_types: &'a [String],
    file_size_limit: u64,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
    /// Folders come back without an id
    id: Option<String>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    metadata: Option<ListMetadata>,
}

#[derive(Debug, Deserialize)]
struct ListMetadata {
    size: Option<u64>,
    mimetype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "statusCode")]
    status_code: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(SupabaseConfig::from_env()?))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.config.url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.config.api_key)
            .header("apikey", &self.config.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(StoreError::backend)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(map_error_response(status, &text))
    }

    /// One page of a single folder level
    async fn list_level(
        &self,
        bucket: &str,
        folder: &str,
        offset: usize,
    ) -> StoreResult<Vec<ListEntry>> {
        let body = json!({
            "prefix": folder,
            "limit": PAGE_SIZE,
            "offset": offset,
            "sortBy": { "column": "name", "order": "asc" },
        });
        let response = self
            .send(
                self.client
                    .post(self.endpoint(&format!("object/list/{}", urlencoding::encode(bucket))))
                    .json(&body),
            )
            .await?;
        response.json().await.map_err(StoreError::backend)
    }
}

/// Storage reports duplicates as 400 with an embedded `"statusCode": "409"`
fn map_error_response(status: StatusCode, text: &str) -> StoreError {
    let parsed: Option<ErrorBody> = serde_json::from_str(text).ok();
    let (code, error, message) = match &parsed {
        Some(body) => (
            body.status_code.as_deref().unwrap_or_default(),
            body.error.as_deref().unwrap_or_default(),
            body.message.as_deref().unwrap_or(text),
        ),
        None => ("", "", text),
    };

    let duplicate = status == StatusCode::CONFLICT
        || code == "409"
        || error.eq_ignore_ascii_case("Duplicate")
        || message.contains("already exists");
    if duplicate {
        return StoreError::already_exists(message);
    }
    if status == StatusCode::NOT_FOUND || code == "404" {
        return StoreError::not_found(message);
    }
    StoreError::rejected(status.as_u16(), message)
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        let response = self.send(self.client.get(self.endpoint("bucket"))).await?;
        let buckets: Vec<BucketEntry> = response.json().await.map_err(StoreError::backend)?;
        Ok(buckets.into_iter().map(|b| b.name).collect())
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> StoreResult<()> {
        let body = CreateBucketBody {
            id: &spec.name,
            name: &spec.name,
            public: spec.public,
            allowed_mime_types: &spec.allowed_mime_types,
            file_size_limit: spec.file_size_limit,
        };
        self.send(self.client.post(self.endpoint("bucket")).json(&body))
            .await?;
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: &UploadOptions,
    ) -> StoreResult<()> {
        let request = self
            .client
            .post(self.endpoint(&object_path("object", bucket, path)))
            .header(reqwest::header::CONTENT_TYPE, &options.content_type)
            .header(
                reqwest::header::CACHE_CONTROL,
                format!("max-age={}", options.cache_control),
            )
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(body);
        self.send(request).await?;
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let root = prefix.trim_end_matches('/').to_string();
        let mut pending = vec![root.clone()];
        let mut objects = Vec::new();

        while let Some(folder) = pending.pop() {
            let mut offset = 0;
            loop {
                let page = self.list_level(bucket, &folder, offset).await?;
                let fetched = page.len();

                for entry in page {
                    let full = join_path(&folder, &entry.name);
                    if entry.id.is_none() {
                        pending.push(full);
                        continue;
                    }
                    let relative = match full.strip_prefix(root.as_str()) {
                        Some(rest) if !root.is_empty() => rest.trim_start_matches('/').to_string(),
                        _ => full.clone(),
                    };
                    let mut info = ObjectInfo::new(relative);
                    if let Some(meta) = entry.metadata {
                        info.size = meta.size;
                        info.content_type = meta.mimetype;
                    }
                    info.updated_at = entry.updated_at.map(|t| t.timestamp());
                    objects.push(info);
                }

                if fetched < PAGE_SIZE {
                    break;
                }
                offset += fetched;
            }
        }

        Ok(objects)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StoreResult<()> {
        let body = json!({ "prefixes": paths });
        self.send(
            self.client
                .delete(self.endpoint(&format!("object/{}", urlencoding::encode(bucket))))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn public_url(&self, bucket: &str, path: &str) -> StoreResult<String> {
        Ok(self.endpoint(&object_path("object/public", bucket, path)))
    }

    async fn download(&self, bucket: &str, path: &str) -> StoreResult<Bytes> {
        let response = self
            .send(
                self.client
                    .get(self.endpoint(&object_path("object", bucket, path))),
            )
            .await?;
        response.bytes().await.map_err(StoreError::backend)
    }
}

/// `{route}/{bucket}/{path}` with the bucket and each path segment
/// percent-encoded; `/` separators are kept
fn object_path(route: &str, bucket: &str, path: &str) -> String {
    let segments: Vec<_> = path.split('/').map(urlencoding::encode).collect();
    format!("{}/{}/{}", route, urlencoding::encode(bucket), segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_body_maps_to_collision() {
        let body = r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#;
        let err = map_error_response(StatusCode::BAD_REQUEST, body);
        assert!(err.is_collision());
    }

    #[test]
    fn test_not_found_body() {
        let body = r#"{"statusCode":"404","error":"not_found","message":"Object not found"}"#;
        let err = map_error_response(StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_plain_text_error_is_rejected() {
        let err = map_error_response(StatusCode::INTERNAL_SERVER_ERROR, "upstream timeout");
        match err {
            StoreError::Rejected { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream timeout");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_public_url_layout() {
        let store = SupabaseStore::new(SupabaseConfig::new("https://proj.supabase.co/", "key"));
        let url = tokio_test::block_on(store.public_url("interview-videos", "s1/a.webm")).unwrap();
        assert_eq!(
            url,
            "https://proj.supabase.co/storage/v1/object/public/interview-videos/s1/a.webm"
        );
    }

    #[test]
    fn test_public_url_encodes_reserved_characters() {
        let store = SupabaseStore::new(SupabaseConfig::new("https://proj.supabase.co", "key"));
        let url = tokio_test::block_on(
            store.public_url("interview-videos", "s?1#2/audio 50%.webm"),
        )
        .unwrap();
        assert_eq!(
            url,
            "https://proj.supabase.co/storage/v1/object/public/interview-videos/s%3F1%232/audio%2050%25.webm"
        );
    }

    #[test]
    fn test_object_path_keeps_separators() {
        assert_eq!(
            object_path("object", "interview-videos", "user/s1/a.webm"),
            "object/interview-videos/user/s1/a.webm"
        );
    }
}
