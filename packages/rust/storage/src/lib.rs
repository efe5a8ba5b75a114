//! Flat-file registry store.
//!
//! The [`Registry`] holds every [`RegistryEntry`] in memory and mirrors them to a
//! single JSON file (`registry.json`). It is constructed once per build by the
//! orchestrator and lent to each stage; stages mutate entries through the
//! accessor methods below so that the dirty flag stays accurate.
//!
//! **Access rules:**
//! - loaded wholesale, saved wholesale, by a single writer between stages
//! - a missing or corrupt store file is never fatal: it loads as an empty store

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use docsmith_shared::{
    CURRENT_STORE_VERSION, ContentHash, DocMetadata, DocsmithError, RegistryEntry, RegistryStore,
    Result, normalize_lang,
};
use tracing::{debug, info, warn};

/// What [`Registry::upsert_scanned`] did with a discovered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A previously unseen hash; a fresh entry was created.
    Added,
    /// Known hash found at a new path; the entry's path was updated.
    Moved,
    /// Known hash at its known path (links may still have been refreshed).
    Unchanged,
}

/// In-memory registry mirrored to one store file.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    store: RegistryStore,
    by_hash: HashMap<ContentHash, usize>,
    dirty: bool,
}

impl Registry {
    /// An empty registry that will be saved to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self::from_store(path.into(), RegistryStore::default())
    }

    /// Load the store at `path`, or start empty if it is absent or corrupt.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match read_store(&path) {
            Ok(Some(store)) => {
                info!(path = %path.display(), entries = store.entries.len(), "registry loaded");
                Self::from_store(path, store)
            }
            Ok(None) => {
                debug!(path = %path.display(), "no registry store, starting empty");
                Self::empty(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "registry store unreadable, starting empty");
                Self::empty(path)
            }
        }
    }

    fn from_store(path: PathBuf, mut store: RegistryStore) -> Self {
        // Drop duplicate hashes from a hand-edited store; first occurrence wins.
        let mut seen = HashSet::new();
        let before = store.entries.len();
        store.entries.retain(|e| seen.insert(e.hash.clone()));
        let deduped = before != store.entries.len();
        if deduped {
            warn!(dropped = before - store.entries.len(), "registry store contained duplicate hashes");
        }

        let mut registry = Self {
            path,
            store,
            by_hash: HashMap::new(),
            dirty: deduped,
        };
        registry.rebuild_index();
        registry
    }

    fn rebuild_index(&mut self) {
        self.by_hash = self
            .store
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.hash.clone(), i))
            .collect();
    }

    /// Location of the backing store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the full current state, stamping a fresh timestamp.
    pub fn save(&mut self) -> Result<()> {
        self.store.updated_at = Utc::now();
        write_store(&self.path, &self.store)?;
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.store.entries.len(), "registry saved");
        Ok(())
    }

    /// Save only if something changed since the last load or save.
    pub fn flush(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.store.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.entries.is_empty()
    }

    /// Entries in store order.
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.store.entries
    }

    /// Finalized category taxonomy from the last classification.
    pub fn categories(&self) -> &[String] {
        &self.store.categories
    }

    pub fn find_by_hash(&self, hash: &ContentHash) -> Option<&RegistryEntry> {
        self.by_hash.get(hash).map(|&i| &self.store.entries[i])
    }

    pub fn find_by_path(&self, path: &str) -> Option<&RegistryEntry> {
        self.store.entries.iter().find(|e| e.path == path)
    }

    fn entry_mut(&mut self, hash: &ContentHash) -> Option<&mut RegistryEntry> {
        let i = *self.by_hash.get(hash)?;
        Some(&mut self.store.entries[i])
    }

    // -----------------------------------------------------------------------
    // Scanner mutations
    // -----------------------------------------------------------------------

    /// Reconcile one discovered document: create, move, or refresh links.
    pub fn upsert_scanned(
        &mut self,
        hash: &ContentHash,
        path: &str,
        links: Vec<String>,
    ) -> UpsertOutcome {
        let Some(entry) = self.entry_mut(hash) else {
            let entry = RegistryEntry::new(hash.clone(), path, links);
            self.by_hash.insert(hash.clone(), self.store.entries.len());
            self.store.entries.push(entry);
            self.dirty = true;
            return UpsertOutcome::Added;
        };

        let moved = entry.path != path;
        let relinked = entry.links != links;
        if moved {
            entry.path = path.to_string();
        }
        if relinked {
            entry.links = links;
        }
        if moved || relinked {
            self.dirty = true;
        }

        if moved {
            UpsertOutcome::Moved
        } else {
            UpsertOutcome::Unchanged
        }
    }

    /// Evict every entry whose hash is not in `live`. Returns the evicted entries.
    pub fn retain_hashes(&mut self, live: &HashSet<ContentHash>) -> Vec<RegistryEntry> {
        let (kept, evicted): (Vec<_>, Vec<_>) = std::mem::take(&mut self.store.entries)
            .into_iter()
            .partition(|e| live.contains(&e.hash));
        self.store.entries = kept;

        if !evicted.is_empty() {
            self.dirty = true;
            self.rebuild_index();
        }
        evicted
    }

    // -----------------------------------------------------------------------
    // Stage mutations
    // -----------------------------------------------------------------------

    /// Set the full enrichment result. Returns `false` if the hash is not live.
    pub fn set_metadata(&mut self, hash: &ContentHash, metadata: DocMetadata) -> bool {
        let Some(entry) = self.entry_mut(hash) else {
            return false;
        };
        if entry.metadata.as_ref() != Some(&metadata) {
            entry.metadata = Some(metadata);
            self.dirty = true;
        }
        true
    }

    /// Assign a category label. Returns `false` if the hash is not live.
    pub fn set_category(&mut self, hash: &ContentHash, label: &str) -> bool {
        let Some(entry) = self.entry_mut(hash) else {
            return false;
        };
        if entry.category.as_deref() != Some(label) {
            entry.category = Some(label.to_string());
            self.dirty = true;
        }
        true
    }

    /// Replace the finalized category taxonomy.
    pub fn set_categories(&mut self, labels: Vec<String>) {
        if self.store.categories != labels {
            self.store.categories = labels;
            self.dirty = true;
        }
    }

    /// Record the hash of the emitted native document.
    pub fn set_materialized_hash(&mut self, hash: &ContentHash, materialized: ContentHash) -> bool {
        let Some(entry) = self.entry_mut(hash) else {
            return false;
        };
        if entry.materialized_content_hash.as_ref() != Some(&materialized) {
            entry.materialized_content_hash = Some(materialized);
            self.dirty = true;
        }
        true
    }

    /// Record that the translation into `lang` was produced from `source`.
    pub fn record_translation(&mut self, hash: &ContentHash, lang: &str, source: ContentHash) -> bool {
        let lang = normalize_lang(lang);
        let Some(entry) = self.entry_mut(hash) else {
            return false;
        };
        if entry.translations.get(&lang) != Some(&source) {
            entry.translations.insert(lang, source);
            self.dirty = true;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Read and validate the store file. `Ok(None)` when it does not exist.
fn read_store(path: &Path) -> Result<Option<RegistryStore>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DocsmithError::io(path, e)),
    };

    let store: RegistryStore =
        serde_json::from_str(&content).map_err(|e| DocsmithError::StoreCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if store.version > CURRENT_STORE_VERSION {
        return Err(DocsmithError::StoreCorrupt {
            path: path.to_path_buf(),
            message: format!(
                "unsupported store version {} (expected <= {CURRENT_STORE_VERSION})",
                store.version
            ),
        });
    }

    Ok(Some(store))
}

/// Write the store atomically (temp file, then rename).
fn write_store(path: &Path, store: &RegistryStore) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DocsmithError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(store)
        .map_err(|e| DocsmithError::validation(format!("JSON serialization failed: {e}")))?;

    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, json).map_err(|e| DocsmithError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| DocsmithError::io(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
