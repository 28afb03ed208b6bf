//! Object storage and per-module artifact layout (spec §4.13):
//! `cache/objects/` holds content-addressed blobs, `cache/modules/<fp
//! prefix>/` holds per-module artifacts with a `.meta` sidecar, and the
//! manifest tracks which module currently owns which fingerprint.

use std::path::PathBuf;

use tracing::warn;

use crate::error::{CacheError, CacheResult};
use crate::fingerprint::fingerprint_bytes;
use crate::manifest::{Manifest, ManifestEntry};
use crate::timestamp::now_iso8601;

const DEFAULT_MAX_ENTRIES: usize = 100;
const PREFIX_LEN: usize = 8;

pub struct Cache {
    root: PathBuf,
    max_entries: usize,
}

impl Cache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), max_entries: DEFAULT_MAX_ENTRIES }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.txt")
    }

    fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    fn module_dir(&self, fingerprint: &str) -> PathBuf {
        let prefix = &fingerprint[..fingerprint.len().min(PREFIX_LEN)];
        self.root.join("modules").join(prefix)
    }

    pub fn load_manifest(&self) -> Manifest {
        Manifest::read(&self.manifest_path()).unwrap_or_else(|e| {
            warn!(target: "cm_cache", error = %e, "failed to read manifest, starting cold");
            Manifest::new()
        })
    }

    /// Stores `bytes` under its content hash and returns that hash.
    pub fn store_object(&self, bytes: &[u8]) -> CacheResult<String> {
        let fp = fingerprint_bytes(bytes);
        let dir = self.objects_dir();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Io { path: dir.display().to_string(), source })?;
        let path = dir.join(format!("{fp}.obj"));
        std::fs::write(&path, bytes).map_err(|source| CacheError::Io { path: path.display().to_string(), source })?;
        Ok(fp)
    }

    pub fn load_object(&self, fingerprint: &str) -> CacheResult<Option<Vec<u8>>> {
        let path = self.objects_dir().join(format!("{fingerprint}.obj"));
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read(&path).map(Some).map_err(|source| CacheError::Io { path: path.display().to_string(), source })
    }

    /// Stores a module's artifact plus a `.meta` sidecar, records it in
    /// the manifest, and evicts the oldest entries over budget. Any I/O
    /// failure here is logged and swallowed: a cache miss just means a
    /// cold recompile, never a failed build.
    pub fn store_module(&self, module_name: &str, fingerprint: &str, artifact: &[u8], meta: &str) {
        if let Err(e) = self.try_store_module(module_name, fingerprint, artifact, meta) {
            warn!(target: "cm_cache", error = %e, module_name, "failed to persist module artifact");
        }
    }

    fn try_store_module(&self, module_name: &str, fingerprint: &str, artifact: &[u8], meta: &str) -> CacheResult<()> {
        let dir = self.module_dir(fingerprint);
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Io { path: dir.display().to_string(), source })?;
        let artifact_path = dir.join(format!("{module_name}.artifact"));
        let meta_path = dir.join(format!("{module_name}.meta"));
        std::fs::write(&artifact_path, artifact)
            .map_err(|source| CacheError::Io { path: artifact_path.display().to_string(), source })?;
        std::fs::write(&meta_path, meta).map_err(|source| CacheError::Io { path: meta_path.display().to_string(), source })?;

        let mut manifest = self.load_manifest();
        manifest.upsert(ManifestEntry {
            module_name: module_name.to_string(),
            fingerprint: fingerprint.to_string(),
            timestamp: now_iso8601(),
            object_path: artifact_path.display().to_string(),
        });
        self.evict_oldest(&mut manifest);
        manifest.write(&self.manifest_path())
    }

    pub fn load_module_artifact(&self, module_name: &str) -> Option<Vec<u8>> {
        let manifest = self.load_manifest();
        let entry = manifest.find(module_name)?;
        std::fs::read(&entry.object_path).ok()
    }

    fn evict_oldest(&self, manifest: &mut Manifest) {
        if manifest.entries.len() <= self.max_entries {
            return;
        }
        manifest.entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        let overflow = manifest.entries.len() - self.max_entries;
        for entry in manifest.entries.drain(..overflow) {
            let _ = std::fs::remove_file(&entry.object_path);
        }
    }

    /// Module names whose current fingerprint differs from (or is
    /// absent from) the manifest — the set `cm-drv` needs to recompile.
    pub fn detect_changed_modules(&self, current: &[(String, String)]) -> Vec<String> {
        let manifest = self.load_manifest();
        current
            .iter()
            .filter(|(name, fp)| manifest.find(name).map(|e| &e.fingerprint != fp).unwrap_or(true))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Same check at file granularity: paths whose on-disk fingerprint
    /// no longer matches what's recorded for `module_name`.
    pub fn detect_changed_files(&self, module_name: &str, paths: &[PathBuf]) -> Vec<PathBuf> {
        let Some(entry) = self.load_manifest().find(module_name).cloned() else {
            return paths.to_vec();
        };
        let parts: Vec<String> = paths.iter().filter_map(|p| crate::fingerprint::fingerprint_file(p).ok()).collect();
        let composite = crate::fingerprint::composite_fingerprint(&parts);
        if composite == entry.fingerprint {
            Vec::new()
        } else {
            paths.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stores_and_loads_an_object_by_content_hash() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let fp = cache.store_object(b"payload").unwrap();
        let loaded = cache.load_object(&fp).unwrap().unwrap();
        assert_eq!(loaded, b"payload");
    }

    #[test]
    fn detects_changed_modules_against_manifest() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        cache.store_module("mod_a", "fp1", b"artifact", "{}");

        let changed = cache.detect_changed_modules(&[("mod_a".to_string(), "fp1".to_string())]);
        assert!(changed.is_empty());

        let changed = cache.detect_changed_modules(&[("mod_a".to_string(), "fp2".to_string())]);
        assert_eq!(changed, vec!["mod_a".to_string()]);
    }

    #[test]
    fn eviction_drops_oldest_entries_past_max() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path()).with_max_entries(2);
        cache.store_module("a", "fp_a", b"x", "{}");
        cache.store_module("b", "fp_b", b"x", "{}");
        cache.store_module("c", "fp_c", b"x", "{}");

        let manifest = cache.load_manifest();
        assert_eq!(manifest.entries.len(), 2);
        assert!(manifest.find("a").is_none());
    }
}
