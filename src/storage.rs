//! Object storage for original receipt files.
//!
//! The scan pipeline keeps the uploaded bytes so users can open the original
//! receipt later. Storage is best-effort: a failed write only leaves
//! `receipt_url` empty in the scan response.
//!
//! # Providers
//!
//! | Provider | Type | Behaviour |
//! |----------|------|-----------|
//! | `disabled` | [`DisabledStore`] | every write fails with [`StorageError::Disabled`] |
//! | `s3` | [`S3ObjectStore`] | `PutObject` via the S3 REST API, SigV4-signed |
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`: required for `s3`
//! - `AWS_SESSION_TOKEN`: optional (temporary credentials / IAM roles)
//!
//! Signing uses HMAC-SHA256 from the pure-Rust `hmac` + `sha2` crates, so
//! there is no C dependency. Custom endpoints (MinIO, LocalStack) are
//! addressed path-style: `<endpoint>/<bucket>/<key>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::StorageConfig;

/// Failure of a single object store write.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object storage is disabled")]
    Disabled,
    #[error("{0} environment variable not set")]
    MissingCredentials(&'static str),
    #[error("failed to put {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("S3 PutObject failed (HTTP {status}): {body}")]
    Status { status: u16, body: String },
}

/// Destination for original upload bytes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    /// Store `bytes` under `key` and return a URL for the stored object.
    async fn put(&self, key: &str, bytes: &[u8], media_type: &str) -> Result<String, StorageError>;
}

/// Build the object store selected by `[storage].provider`.
pub fn create_object_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledStore)),
        "s3" => Ok(Arc::new(S3ObjectStore::new(config.clone())?)),
        other => anyhow::bail!("Unknown storage provider: {}", other),
    }
}

/// Derive a collision-resistant object key for an upload.
///
/// Shape: `<prefix><unix-millis>_<8 hex chars>_<sanitized file name>`.
/// Directory components are dropped from the file name and every byte
/// outside `[A-Za-z0-9._-]` becomes `_`.
pub fn object_key(prefix: &str, file_name: &str, now: DateTime<Utc>) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}{}_{}_{}",
        prefix,
        now.timestamp_millis(),
        &nonce[..8],
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

// ============ Disabled ============

/// Store used when `[storage].provider = "disabled"`.
pub struct DisabledStore;

#[async_trait]
impl ObjectStore for DisabledStore {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn put(&self, _key: &str, _bytes: &[u8], _media_type: &str) -> Result<String, StorageError> {
        Err(StorageError::Disabled)
    }
}

// ============ S3 ============

type HmacSha256 = Hmac<Sha256>;

/// S3 (or S3-compatible) bucket written with signed `PutObject` requests.
pub struct S3ObjectStore {
    config: StorageConfig,
    bucket: String,
    client: reqwest::Client,
}

impl S3ObjectStore {
    pub fn new(config: StorageConfig) -> anyhow::Result<Self> {
        let bucket = config
            .bucket
            .clone()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| anyhow::anyhow!("storage.bucket required for s3 provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            bucket,
            client,
        })
    }

    /// Scheme + host, and the canonical URI path for `key`.
    fn locate(&self, key: &str) -> (String, String, String) {
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        match self.config.endpoint_url {
            Some(ref endpoint) => {
                let endpoint = endpoint.trim_end_matches('/');
                let host = endpoint
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .to_string();
                let path = format!("/{}/{}", uri_encode(&self.bucket), encoded_key);
                (endpoint.to_string(), host, path)
            }
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", self.bucket, self.config.region);
                (format!("https://{}", host), host, format!("/{}", encoded_key))
            }
        }
    }

    fn public_url(&self, base: &str, key: &str, path: &str) -> String {
        match self.config.public_base_url {
            Some(ref public) => format!("{}/{}", public.trim_end_matches('/'), key),
            None => format!("{}{}", base, path),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &str {
        "s3"
    }

    async fn put(&self, key: &str, bytes: &[u8], media_type: &str) -> Result<String, StorageError> {
        let creds = AwsCredentials::from_env()?;
        let (base, host, canonical_uri) = self.locate(key);
        let url = format!("{}{}", base, canonical_uri);

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex_sha256(bytes);

        let mut headers = vec![
            ("content-type".to_string(), media_type.to_string()),
            ("host".to_string(), host),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();

        let canonical_request = format!(
            "PUT\n{}\n\n{}\n{}\n{}",
            canonical_uri, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );
        let signing_key = derive_signing_key(
            &creds.secret_access_key,
            &date_stamp,
            &self.config.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());
        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut req_builder = self
            .client
            .put(&url)
            .header("Authorization", &authorization)
            .header("Content-Type", media_type)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date)
            .body(bytes.to_vec());
        if let Some(ref token) = creds.session_token {
            req_builder = req_builder.header("x-amz-security-token", token);
        }

        let resp = req_builder
            .send()
            .await
            .map_err(|source| StorageError::Request {
                url: url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status,
                body: body.chars().take(500).collect(),
            });
        }

        Ok(self.public_url(&base, key, &canonical_uri))
    }
}

/// AWS credentials loaded from environment variables.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self, StorageError> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| StorageError::MissingCredentials("AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| StorageError::MissingCredentials("AWS_SECRET_ACCESS_KEY"))?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();
        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

// ============ AWS SigV4 Helpers ============

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 encoding of everything except `A-Z a-z 0-9 - _ . ~`.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn s3(endpoint: Option<&str>, public: Option<&str>) -> S3ObjectStore {
        S3ObjectStore::new(StorageConfig {
            provider: "s3".to_string(),
            bucket: Some("wedexpense-receipts".to_string()),
            region: "ap-south-1".to_string(),
            endpoint_url: endpoint.map(str::to_string),
            public_base_url: public.map(str::to_string),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn object_key_is_prefixed_timestamped_and_sanitized() {
        let now = Utc.timestamp_millis_opt(1_736_640_000_123).unwrap();
        let key = object_key("receipts/", "Royal Caterers (final).jpg", now);
        assert!(key.starts_with("receipts/1736640000123_"), "{}", key);
        assert!(key.ends_with("_Royal_Caterers__final_.jpg"), "{}", key);
        assert_ne!(key, object_key("receipts/", "Royal Caterers (final).jpg", now));
    }

    #[test]
    fn sanitize_drops_directories_and_empty_names() {
        assert_eq!(sanitize_file_name("C:\\Users\\me\\bill.pdf"), "bill.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("..."), "upload");
        assert_eq!(sanitize_file_name("रसीद.png"), "____.png");
    }

    #[test]
    fn aws_host_uses_virtual_hosted_style() {
        let store = s3(None, None);
        let (base, host, path) = store.locate("receipts/a b.jpg");
        assert_eq!(host, "wedexpense-receipts.s3.ap-south-1.amazonaws.com");
        assert_eq!(base, "https://wedexpense-receipts.s3.ap-south-1.amazonaws.com");
        assert_eq!(path, "/receipts/a%20b.jpg");
    }

    #[test]
    fn custom_endpoint_uses_path_style() {
        let store = s3(Some("http://localhost:9000/"), None);
        let (base, host, path) = store.locate("receipts/x.pdf");
        assert_eq!(base, "http://localhost:9000");
        assert_eq!(host, "localhost:9000");
        assert_eq!(path, "/wedexpense-receipts/receipts/x.pdf");
        assert_eq!(
            store.public_url(&base, "receipts/x.pdf", &path),
            "http://localhost:9000/wedexpense-receipts/receipts/x.pdf"
        );
    }

    #[test]
    fn public_base_url_overrides_object_url() {
        let store = s3(None, Some("https://cdn.example.com/r/"));
        assert_eq!(
            store.public_url("https://ignored", "receipts/x.pdf", "/receipts/x.pdf"),
            "https://cdn.example.com/r/receipts/x.pdf"
        );
    }

    #[test]
    fn signing_key_matches_aws_reference() {
        // Example from the AWS SigV4 documentation.
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[tokio::test]
    async fn disabled_store_always_fails() {
        let err = DisabledStore.put("k", b"x", "image/jpeg").await.unwrap_err();
        assert!(matches!(err, StorageError::Disabled));
    }
}
