//! Tag diffing and synchronization
//!
//! Every taggable object, whatever its service, is addressed through the same
//! resource name:
//!
//! ```text
//! qcs::{service}:{region}:uin/:{resource_prefix}/{resource_id}
//! e.g. qcs::vpc:ap-guangzhou:uin/:vpngw/vpngw-8ccsnclt
//! ```
//!
//! Synchronization reads the remote tag set back, computes the minimal
//! replace/delete pair, and issues a single modify call. Re-running it after a
//! partial failure is always safe.

use crate::call::RemoteCall;
use crate::error::{CloudError, Result};
use crate::executor::RetryExecutor;
use crate::logging::ElapsedLog;
use crate::paginate::{DEFAULT_PAGE_LIMIT, Page, collect};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

/// Key/value tags attached to one resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, String>> for TagSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<HashMap<String, String>> for TagSet {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl IntoIterator for TagSet {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Changes needed to turn an observed tag set into a desired one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Desired tags that are missing or carry a different value remotely
    pub replace: TagSet,
    /// Remote keys that are no longer desired
    pub delete: BTreeSet<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.delete.is_empty()
    }

    /// The tag set that results from applying this diff to `observed`
    pub fn apply_to(&self, observed: &TagSet) -> TagSet {
        let mut result = observed.clone().into_inner();
        for key in &self.delete {
            result.remove(key);
        }
        for (key, value) in &self.replace {
            result.insert(key.clone(), value.clone());
        }
        TagSet(result)
    }
}

impl std::fmt::Display for TagDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to replace, {} to delete",
            self.replace.len(),
            self.delete.len()
        )
    }
}

/// Compute the replace/delete pair moving `observed` to `desired`.
///
/// Also used on the update path with the previous configuration standing in
/// for `observed`.
pub fn diff(desired: &TagSet, observed: &TagSet) -> TagDiff {
    let replace = desired
        .iter()
        .filter(|(key, value)| observed.get(key) != Some(value.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let delete = observed
        .keys()
        .filter(|key| !desired.contains_key(key))
        .cloned()
        .collect();
    TagDiff { replace, delete }
}

/// Uniform address of a taggable object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    pub service: String,
    pub resource_prefix: String,
    pub region: String,
    pub resource_id: String,
}

impl ResourceAddress {
    pub fn new(
        service: impl Into<String>,
        resource_prefix: impl Into<String>,
        region: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            resource_prefix: resource_prefix.into(),
            region: region.into(),
            resource_id: resource_id.into(),
        }
    }
}

impl std::fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "qcs::{}:{}:uin/:{}/{}",
            self.service, self.region, self.resource_prefix, self.resource_id
        )
    }
}

impl FromStr for ResourceAddress {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CloudError::InvalidAddress(s.to_string());
        let rest = s.strip_prefix("qcs::").ok_or_else(invalid)?;
        let mut segments = rest.splitn(4, ':');
        let (Some(service), Some(region), Some("uin/"), Some(resource)) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(invalid());
        };
        let (resource_prefix, resource_id) = resource.split_once('/').ok_or_else(invalid)?;
        if service.is_empty() || resource_prefix.is_empty() || resource_id.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(service, resource_prefix, region, resource_id))
    }
}

/// One record of the tag listing API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceTag {
    pub resource_id: String,
    pub tag_key: String,
    pub tag_value: String,
}

/// The provider's tag service, as consumed by [`TagSynchronizer`]
#[async_trait]
pub trait TagApi: Send + Sync {
    /// One page of tags for resources matching the address's service, prefix,
    /// region and resource id. May include neighbouring resources.
    async fn describe_resource_tags(
        &self,
        address: &ResourceAddress,
        offset: u64,
        limit: u64,
    ) -> Result<Page<ResourceTag>>;

    /// Replace and delete tags on one resource in a single call
    async fn modify_resource_tags(
        &self,
        address: &ResourceAddress,
        replace: &TagSet,
        delete: &[String],
    ) -> Result<()>;
}

/// Reads and synchronizes tags through a [`TagApi`]
pub struct TagSynchronizer<A> {
    api: A,
    executor: RetryExecutor,
    page_limit: u64,
}

impl<A: TagApi> TagSynchronizer<A> {
    pub fn new(api: A, executor: RetryExecutor) -> Self {
        Self {
            api,
            executor,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn with_page_limit(mut self, page_limit: u64) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Current remote tags of the addressed resource
    pub async fn read(&self, address: &ResourceAddress) -> Result<TagSet> {
        let (api, executor) = (&self.api, &self.executor);
        let records = collect(self.page_limit, move |offset, limit| {
            executor.execute(RemoteCall::read(
                "DescribeResourceTagsByResourceIds",
                move || api.describe_resource_tags(address, offset, limit),
            ))
        })
        .await?;

        let total = records.len();
        let tags: TagSet = records
            .into_iter()
            .filter(|record| record.resource_id == address.resource_id)
            .map(|record| (record.tag_key, record.tag_value))
            .collect();
        if tags.len() < total {
            tracing::debug!(
                "Ignored {} tag records of neighbouring resources for {}",
                total - tags.len(),
                address
            );
        }
        Ok(tags)
    }

    /// Make the remote tags equal to `desired`. Returns the diff that was applied.
    pub async fn sync(&self, address: &ResourceAddress, desired: &TagSet) -> Result<TagDiff> {
        let _elapsed = ElapsedLog::start(format!("tags.sync {}", address));
        let observed = self
            .read(address)
            .await
            .map_err(|e| tag_sync_error(address, e))?;
        let diff = diff(desired, &observed);
        self.apply(address, &diff).await?;
        Ok(diff)
    }

    /// Apply a precomputed diff without reading the remote tags first
    pub async fn apply(&self, address: &ResourceAddress, diff: &TagDiff) -> Result<()> {
        if diff.is_empty() {
            tracing::debug!("Tags of {} already up to date", address);
            return Ok(());
        }

        tracing::info!("Modifying tags of {}: {}", address, diff);
        let delete: Vec<String> = diff.delete.iter().cloned().collect();
        let (api, replace, delete) = (&self.api, &diff.replace, &delete);
        self.executor
            .execute(RemoteCall::write("ModifyResourceTags", move || {
                api.modify_resource_tags(address, replace, delete)
            }))
            .await
            .map_err(|e| tag_sync_error(address, e))
    }
}

fn tag_sync_error(address: &ResourceAddress, source: CloudError) -> CloudError {
    CloudError::TagSync {
        resource: address.to_string(),
        source: Box::new(source),
    }
}
