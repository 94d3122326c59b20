use crate::config::Config;
use crate::success_marker::success_marker_exists;
use crate::types::{DataAccessError, ObjectMetadata, ObjectTags, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Tag, Tagging};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One object returned from a prefix listing.
#[derive(Debug, Clone)]
pub struct ListedObject {
    pub key: String,
    pub body: String,
    pub metadata: ObjectMetadata,
    pub tags: ObjectTags,
}

/// Get/put/list/tag primitives over a bucketed object store.
///
/// All operations are single remote calls (plus an existence check for
/// overwrite-disallowed puts). No retries happen at this layer; transient
/// failures surface to the caller unchanged.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's body, metadata, and tags.
    async fn get(&self, bucket: &str, key: &str) -> Result<(String, ObjectMetadata, ObjectTags)>;

    /// Write an object. With `overwrite_allowed = false` an existence check
    /// runs first and an occupied key fails with `ObjectAlreadyExists`.
    ///
    /// The check and the write are separate calls, so two concurrent writers
    /// can both pass the check and one silently clobbers the other. This is
    /// a known limitation of the protocol, not something implementations
    /// paper over.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &str,
        metadata: &ObjectMetadata,
        tags: &ObjectTags,
        overwrite_allowed: bool,
    ) -> Result<()>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// List objects under `prefix` whose keys end in `suffix`, in ascending
    /// lexicographic key order, with their bodies, metadata, and tags.
    async fn list_with_suffix(
        &self,
        bucket: &str,
        prefix: &str,
        suffix: &str,
    ) -> Result<Vec<ListedObject>>;

    async fn get_tags(&self, bucket: &str, key: &str) -> Result<ObjectTags>;

    /// Replace an object's tag set in full. Tags absent from `tags` are
    /// dropped, not merged.
    async fn replace_tags(&self, bucket: &str, key: &str, tags: &ObjectTags) -> Result<()>;
}

/// Read all objects under a prefix with the given suffix, optionally
/// requiring a success marker at the prefix first.
pub async fn read_objects_from_prefix_with_suffix(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    suffix: &str,
    check_success_marker: bool,
) -> Result<Vec<ListedObject>> {
    if check_success_marker {
        debug!("Checking success marker at prefix {prefix}");
        if !success_marker_exists(store, bucket, prefix).await? {
            return Err(DataAccessError::SuccessMarkerMissing {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            });
        }
    } else {
        debug!("Skipping success marker check at prefix {prefix}");
    }
    info!("Reading objects from prefix {prefix}");
    store.list_with_suffix(bucket, prefix, suffix).await
}

fn storage_err<E: std::fmt::Debug>(context: &str, err: E) -> DataAccessError {
    DataAccessError::Storage(format!("{context}: {err:?}"))
}

fn encode_tagging(tags: &ObjectTags) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in tags {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Object store adapter over an injected S3 client.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Build a client from [`Config`] (region, optional custom endpoint) and
    /// the standard AWS credential chain.
    pub async fn from_config(config: &Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region_name.clone()));
        if let Some(endpoint) = &config.s3_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        Self::new(aws_sdk_s3::Client::new(&sdk_config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<(String, ObjectMetadata, ObjectTags)> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    DataAccessError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    storage_err("get_object failed", service_err)
                }
            })?;
        let metadata = resp.metadata().cloned().unwrap_or_default();
        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| storage_err("reading object body failed", e))?
            .into_bytes();
        let body = String::from_utf8_lossy(&bytes).to_string();
        let tags = self.get_tags(bucket, key).await?;
        Ok((body, metadata, tags))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &str,
        metadata: &ObjectMetadata,
        tags: &ObjectTags,
        overwrite_allowed: bool,
    ) -> Result<()> {
        if !overwrite_allowed && self.exists(bucket, key).await? {
            return Err(DataAccessError::ObjectAlreadyExists {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        info!(
            "Uploading object {key} to bucket {bucket} with overwrite allowed {overwrite_allowed}"
        );
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.as_bytes().to_vec()));
        if !metadata.is_empty() {
            request = request.set_metadata(Some(metadata.clone()));
        }
        if !tags.is_empty() {
            request = request.tagging(encode_tagging(tags));
        }
        request
            .send()
            .await
            .map_err(|e| storage_err("put_object failed", e))?;
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(storage_err("head_object failed", service_err))
                }
            }
        }
    }

    async fn list_with_suffix(
        &self,
        bucket: &str,
        prefix: &str,
        suffix: &str,
    ) -> Result<Vec<ListedObject>> {
        // ListObjectsV2 returns keys in ascending lexicographic order.
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| storage_err("list_objects_v2 failed", e))?;
            for entry in page.contents() {
                let Some(key) = entry.key() else { continue };
                if !key.ends_with(suffix) {
                    continue;
                }
                let (body, metadata, tags) = self.get(bucket, key).await?;
                objects.push(ListedObject {
                    key: key.to_string(),
                    body,
                    metadata,
                    tags,
                });
            }
        }
        Ok(objects)
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> Result<ObjectTags> {
        let resp = self
            .client
            .get_object_tagging()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_err("get_object_tagging failed", e))?;
        Ok(resp
            .tag_set()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect())
    }

    async fn replace_tags(&self, bucket: &str, key: &str, tags: &ObjectTags) -> Result<()> {
        let mut tag_set = Vec::with_capacity(tags.len());
        for (tag_key, tag_value) in tags {
            let tag = Tag::builder()
                .key(tag_key)
                .value(tag_value)
                .build()
                .map_err(|e| storage_err("building tag failed", e))?;
            tag_set.push(tag);
        }
        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(|e| storage_err("building tag set failed", e))?;
        self.client
            .put_object_tagging()
            .bucket(bucket)
            .key(key)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| storage_err("put_object_tagging failed", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct StoredObject {
    body: String,
    metadata: ObjectMetadata,
    tags: ObjectTags,
}

/// In-memory object store with the same observable semantics as
/// [`S3ObjectStore`], used in tests and local development. Keys live in a
/// `BTreeMap`, so listings come back in lexicographic order like S3.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(String, String), StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<(String, ObjectMetadata, ObjectTags)> {
        let objects = self.objects.read().await;
        let stored = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| DataAccessError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok((stored.body.clone(), stored.metadata.clone(), stored.tags.clone()))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &str,
        metadata: &ObjectMetadata,
        tags: &ObjectTags,
        overwrite_allowed: bool,
    ) -> Result<()> {
        let mut objects = self.objects.write().await;
        let map_key = (bucket.to_string(), key.to_string());
        if !overwrite_allowed && objects.contains_key(&map_key) {
            return Err(DataAccessError::ObjectAlreadyExists {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        debug!("Storing object {key} in bucket {bucket}");
        objects.insert(
            map_key,
            StoredObject {
                body: body.to_string(),
                metadata: metadata.clone(),
                tags: tags.clone(),
            },
        );
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let objects = self.objects.read().await;
        Ok(objects.contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn list_with_suffix(
        &self,
        bucket: &str,
        prefix: &str,
        suffix: &str,
    ) -> Result<Vec<ListedObject>> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .filter(|((object_bucket, key), _)| {
                object_bucket == bucket && key.starts_with(prefix) && key.ends_with(suffix)
            })
            .map(|((_, key), stored)| ListedObject {
                key: key.clone(),
                body: stored.body.clone(),
                metadata: stored.metadata.clone(),
                tags: stored.tags.clone(),
            })
            .collect())
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> Result<ObjectTags> {
        let objects = self.objects.read().await;
        let stored = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| DataAccessError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok(stored.tags.clone())
    }

    async fn replace_tags(&self, bucket: &str, key: &str, tags: &ObjectTags) -> Result<()> {
        let mut objects = self.objects.write().await;
        let stored = objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| DataAccessError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        stored.tags = tags.clone();
        Ok(())
    }
}
