use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use super::{Store, StoredObject};
use crate::errors::BackendError;

/// An object kept by [`MemoryStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryObject {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A store that keeps objects in process memory. Uploads can be made to fail
/// or stall to exercise the error paths of callers.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, MemoryObject>>,
    fail_uploads: AtomicBool,
    delay: RwLock<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent upload fail with a storage error.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent upload wait before completing.
    pub fn delay_uploads(&self, delay: Option<Duration>) {
        *self.delay.write().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn get(&self, key: &str) -> Option<MemoryObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();

        keys
    }
}

impl Store for MemoryStore {
    fn upload(
        &self,
        local_path: PathBuf,
        key: String,
        content_type: String,
    ) -> BoxFuture<Result<StoredObject, BackendError>> {
        async move {
            let delay = *self.delay.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(BackendError::Storage(format!("refusing to store {}", key)));
            }

            let data = tokio::fs::read(&local_path)
                .await
                .map_err(BackendError::TemporaryFileError)?;

            self.objects
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.clone(), MemoryObject { content_type, data });

            Ok(StoredObject {
                public_url: format!("memory://{}", key),
                storage_ref: key,
            })
        }
        .boxed()
    }

    fn delete(&self, storage_ref: String) -> BoxFuture<Result<bool, BackendError>> {
        let removed = self
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&storage_ref)
            .is_some();

        async move { Ok(removed) }.boxed()
    }
}
