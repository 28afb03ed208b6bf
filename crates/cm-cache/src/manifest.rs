//! The manifest: a flat, pipe-separated, newline-delimited index of
//! every cached module (spec §4.13). Kept deliberately grep-able rather
//! than a binary or JSON format, matching the object-store layout.

use std::path::Path;

use crate::error::{CacheError, CacheResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub module_name: String,
    pub fingerprint: String,
    pub timestamp: String,
    pub object_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(path: &Path) -> CacheResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path).map_err(|source| CacheError::Io { path: path.display().to_string(), source })?;
        let mut entries = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.splitn(4, '|').collect();
            let [name, fp, ts, obj] = fields.as_slice() else {
                return Err(CacheError::MalformedManifest(line.to_string()));
            };
            entries.push(ManifestEntry {
                module_name: name.to_string(),
                fingerprint: fp.to_string(),
                timestamp: ts.to_string(),
                object_path: obj.to_string(),
            });
        }
        Ok(Self { entries })
    }

    pub fn write(&self, path: &Path) -> CacheResult<()> {
        let mut out = String::from("# cm-cache manifest: module|fingerprint|timestamp|object_path\n");
        for e in &self.entries {
            out.push_str(&format!("{}|{}|{}|{}\n", e.module_name, e.fingerprint, e.timestamp, e.object_path));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Io { path: parent.display().to_string(), source })?;
        }
        std::fs::write(path, out).map_err(|source| CacheError::Io { path: path.display().to_string(), source })
    }

    pub fn upsert(&mut self, entry: ManifestEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.module_name == entry.module_name) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    pub fn find(&self, module_name: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.module_name == module_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.txt");
        let mut m = Manifest::new();
        m.upsert(ManifestEntry {
            module_name: "mod_a".to_string(),
            fingerprint: "abc123".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            object_path: "objects/abc123.obj".to_string(),
        });
        m.write(&path).unwrap();

        let reloaded = Manifest::read(&path).unwrap();
        assert_eq!(reloaded.entries.len(), 1);
        assert_eq!(reloaded.find("mod_a").unwrap().fingerprint, "abc123");
    }

    #[test]
    fn comment_and_blank_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.txt");
        std::fs::write(&path, "# a comment\n\nmod_a|fp|ts|obj\n").unwrap();
        let m = Manifest::read(&path).unwrap();
        assert_eq!(m.entries.len(), 1);
    }
}
