//! Tag name → ID directory
//!
//! The full listing is fetched once and kept for the life of the process.
//! Tags created upstream afterwards stay invisible until [`TagDirectory::reset`]
//! is called or the process restarts.

use chrono::{DateTime, Utc};
use parc_telemetry::Gauge;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::types::{TagDescriptor, TagId};
use crate::{HistorianClient, HistorianError, Result};

/// One immutable generation of the directory
#[derive(Debug)]
pub struct DirectorySnapshot {
    generation: u64,
    loaded_at: DateTime<Utc>,
    tags: Vec<TagDescriptor>,
    by_name: HashMap<String, TagId>,
}

impl DirectorySnapshot {
    pub fn build(generation: u64, tags: Vec<TagDescriptor>) -> Self {
        let mut by_name = HashMap::with_capacity(tags.len());
        for tag in &tags {
            if let Some(existing) = by_name.get(&tag.name) {
                warn!(
                    tag = %tag.name,
                    kept_id = existing,
                    ignored_id = tag.id,
                    "Duplicate tag name in historian listing"
                );
                continue;
            }
            by_name.insert(tag.name.clone(), tag.id);
        }
        Self {
            generation,
            loaded_at: Utc::now(),
            tags,
            by_name,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<TagId> {
        self.by_name.get(name).copied()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn tags(&self) -> &[TagDescriptor] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Names split into those the directory knows and those it does not
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub resolved: Vec<(String, TagId)>,
    pub unresolved: Vec<String>,
}

pub struct TagDirectory {
    client: Arc<HistorianClient>,
    current: RwLock<Option<Arc<DirectorySnapshot>>>,
    loads: AtomicU64,
    size: Gauge,
}

impl TagDirectory {
    pub fn new(client: Arc<HistorianClient>) -> Self {
        Self {
            client,
            current: RwLock::new(None),
            loads: AtomicU64::new(0),
            size: Gauge::new("tag_directory_size"),
        }
    }

    /// The loaded generation, fetching the listing on first use.
    ///
    /// Concurrent first calls may each fetch; the listing is deterministic so
    /// the last one to finish simply replaces an identical map.
    pub async fn snapshot(&self) -> Result<Arc<DirectorySnapshot>> {
        if let Some(snapshot) = self.current.read().await.as_ref() {
            return Ok(snapshot.clone());
        }

        let tags = self.client.list_tags().await?;
        let generation = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(DirectorySnapshot::build(generation, tags));

        info!(
            generation,
            tags = snapshot.len(),
            "Tag directory loaded"
        );
        self.size.set(snapshot.len() as u64);
        *self.current.write().await = Some(snapshot.clone());
        Ok(snapshot)
    }

    pub async fn resolve(&self, name: &str) -> Result<TagId> {
        self.snapshot()
            .await?
            .lookup(name)
            .ok_or_else(|| HistorianError::TagNotFound(name.to_string()))
    }

    /// Resolves every name against a single generation. Duplicates collapse
    /// onto their first occurrence; input order is kept.
    pub async fn resolve_many(&self, names: &[String]) -> Result<Resolution> {
        let snapshot = self.snapshot().await?;
        let mut seen = HashSet::with_capacity(names.len());
        let mut resolution = Resolution::default();

        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match snapshot.lookup(name) {
                Some(id) => resolution.resolved.push((name.clone(), id)),
                None => resolution.unresolved.push(name.clone()),
            }
        }
        Ok(resolution)
    }

    pub async fn list_all(&self) -> Result<Vec<TagDescriptor>> {
        Ok(self.snapshot().await?.tags().to_vec())
    }

    /// Loaded generation without triggering a fetch
    pub async fn peek(&self) -> Option<Arc<DirectorySnapshot>> {
        self.current.read().await.clone()
    }

    /// Forget the loaded generation; the next lookup fetches a fresh listing.
    /// Returns how many tags the dropped generation held.
    pub async fn reset(&self) -> usize {
        let dropped = self.current.write().await.take();
        self.size.set(0);
        let cleared = dropped.map(|s| s.len()).unwrap_or(0);
        info!(cleared, "Tag directory reset");
        cleared
    }

    pub fn size(&self) -> u64 {
        self.size.get()
    }
}
