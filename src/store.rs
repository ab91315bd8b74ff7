use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use rusoto_s3::{DeleteObjectRequest, PutObjectRequest, S3Client, StreamingBody, S3};
use url::Url;

use crate::errors::BackendError;

pub mod memory;

pub type SafeStore = dyn Store + Send + Sync;

/// Where a stored binary ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub public_url: String,

    /// The reference to pass to [`Store::delete`].
    pub storage_ref: String,
}

/// The binary storage collaborator.
pub trait Store {
    /// Uploads the file at `local_path` under `key`.
    fn upload(
        &self,
        local_path: PathBuf,
        key: String,
        content_type: String,
    ) -> BoxFuture<Result<StoredObject, BackendError>>;

    /// Deletes a stored object. Returns whether anything was deleted.
    fn delete(&self, storage_ref: String) -> BoxFuture<Result<bool, BackendError>>;
}

/// A store that saves its data to S3.
pub struct S3Store {
    client: Arc<S3Client>,
    acl: String,
    bucket: String,
    cache_control: String,
    base_url: Url,
}

impl S3Store {
    /// Creates a new instance.
    pub fn new(
        client: Arc<S3Client>,
        acl: String,
        bucket: String,
        cache_control: String,
        base_url: Url,
    ) -> Self {
        Self {
            client,
            acl,
            bucket,
            cache_control,
            base_url,
        }
    }

    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        use rusoto_core::request::HttpClient;
        use rusoto_core::Region;
        use rusoto_credential::StaticProvider;

        use crate::config::get_variable;

        let access_key = get_variable("S3_ACCESS_KEY");
        let secret_access_key = get_variable("S3_SECRET_ACCESS_KEY");

        let region = Region::Custom {
            name: get_variable("S3_REGION_NAME"),
            endpoint: get_variable("S3_ENDPOINT"),
        };

        let bucket = get_variable("S3_BUCKET_NAME");
        let acl = get_variable("PETRANSPORT_S3_ACL");
        let cache_control = get_variable("PETRANSPORT_S3_CACHE_CONTROL");

        let client = Arc::new(S3Client::new_with(
            HttpClient::new()?,
            StaticProvider::new_minimal(access_key, secret_access_key),
            region,
        ));

        let base_url = Url::parse(&get_variable("S3_BASE_URL"))?;

        Ok(S3Store::new(client, acl, bucket, cache_control, base_url))
    }

    fn url_for(&self, key: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(key)
            .map_err(|source| BackendError::FailedToGenerateUrl { source })
    }
}

impl Store for S3Store {
    fn upload(
        &self,
        local_path: PathBuf,
        key: String,
        content_type: String,
    ) -> BoxFuture<Result<StoredObject, BackendError>> {
        upload(self, local_path, key, content_type).boxed()
    }

    fn delete(&self, storage_ref: String) -> BoxFuture<Result<bool, BackendError>> {
        delete(self, storage_ref).boxed()
    }
}

async fn upload(
    store: &S3Store,
    local_path: PathBuf,
    key: String,
    content_type: String,
) -> Result<StoredObject, BackendError> {
    use std::convert::TryFrom;

    let raw = tokio::fs::read(&local_path)
        .await
        .map_err(BackendError::TemporaryFileError)?;
    let len = i64::try_from(raw.len()).map_err(|_| BackendError::FileTooLarge {
        size: raw.len() as u64,
        limit: i64::MAX as u64,
    })?;

    let public_url = store.url_for(&key)?;

    let request = PutObjectRequest {
        acl: Some(store.acl.clone()),
        body: Some(StreamingBody::from(raw)),
        bucket: store.bucket.clone(),
        cache_control: Some(store.cache_control.clone()),
        content_length: Some(len),
        content_type: Some(content_type),
        key: key.clone(),
        ..Default::default()
    };

    store
        .client
        .put_object(request)
        .await
        .map_err(|source| BackendError::UploadFailed { source })?;

    Ok(StoredObject {
        public_url: public_url.to_string(),
        storage_ref: key,
    })
}

async fn delete(store: &S3Store, storage_ref: String) -> Result<bool, BackendError> {
    let request = DeleteObjectRequest {
        bucket: store.bucket.clone(),
        key: storage_ref,
        ..Default::default()
    };

    store
        .client
        .delete_object(request)
        .await
        .map(|_| true)
        .map_err(|source| BackendError::DeleteFailed { source })
}
