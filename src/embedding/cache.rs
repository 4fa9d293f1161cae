//! Durable embedding cache
//!
//! One append-only JSONL log per role, each line `{"text": .., "embedding": [..]}`.
//! Both logs are loaded eagerly; corrupt lines are skipped. Entries are never
//! overwritten, so the first vector recorded for a text wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::Result;
use crate::types::CacheRole;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    text: String,
    embedding: Vec<f32>,
}

struct Partition {
    entries: HashMap<String, Vec<f32>>,
    log: File,
}

/// Role-partitioned, append-only embedding store
pub struct EmbeddingCache {
    dir: PathBuf,
    chunks: Partition,
    queries: Partition,
}

impl EmbeddingCache {
    /// Open (or create) the cache in `dir` and load both partitions
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let chunks = Partition::open(&dir.join(CacheRole::Chunk.file_name()))?;
        let queries = Partition::open(&dir.join(CacheRole::Query.file_name()))?;

        info!(
            dir = %dir.display(),
            chunks = chunks.entries.len(),
            queries = queries.entries.len(),
            "loaded embedding cache"
        );

        Ok(Self { dir, chunks, queries })
    }

    fn partition(&self, role: CacheRole) -> &Partition {
        match role {
            CacheRole::Chunk => &self.chunks,
            CacheRole::Query => &self.queries,
        }
    }

    fn partition_mut(&mut self, role: CacheRole) -> &mut Partition {
        match role {
            CacheRole::Chunk => &mut self.chunks,
            CacheRole::Query => &mut self.queries,
        }
    }

    /// Cached vector for `text` in `role`
    pub fn get(&self, role: CacheRole, text: &str) -> Option<&[f32]> {
        self.partition(role).entries.get(text).map(|v| v.as_slice())
    }

    pub fn contains(&self, role: CacheRole, text: &str) -> bool {
        self.partition(role).entries.contains_key(text)
    }

    /// Record a vector. Returns `false` (and writes nothing) if the text is
    /// already cached in this role.
    ///
    /// The line is written and flushed before the in-memory map changes, so
    /// a successful return means the entry survives a restart.
    pub fn insert(&mut self, role: CacheRole, text: &str, embedding: Vec<f32>) -> Result<bool> {
        let partition = self.partition_mut(role);
        if partition.entries.contains_key(text) {
            return Ok(false);
        }

        let mut line = serde_json::to_string(&CacheEntry {
            text: text.to_string(),
            embedding: embedding.clone(),
        })?;
        line.push('\n');
        partition.log.write_all(line.as_bytes())?;
        partition.log.flush()?;

        partition.entries.insert(text.to_string(), embedding);
        Ok(true)
    }

    /// Number of entries in a partition
    pub fn len(&self, role: CacheRole) -> usize {
        self.partition(role).entries.len()
    }

    pub fn is_empty(&self, role: CacheRole) -> bool {
        self.len(role) == 0
    }

    /// Log file backing a partition
    pub fn path(&self, role: CacheRole) -> PathBuf {
        self.dir.join(role.file_name())
    }
}

impl Partition {
    fn open(path: &Path) -> Result<Self> {
        let mut log = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut contents = Vec::new();
        log.read_to_end(&mut contents)?;

        let mut entries = HashMap::new();
        let mut skipped = 0usize;
        for (line_no, line) in String::from_utf8_lossy(&contents).lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CacheEntry>(line) {
                Ok(entry) if !entry.embedding.is_empty() => {
                    entries
                        .entry(entry.text)
                        .or_insert(entry.embedding);
                }
                Ok(_) => skipped += 1,
                Err(e) => {
                    skipped += 1;
                    warn!(
                        file = %path.display(),
                        line = line_no + 1,
                        error = %e,
                        "skipping corrupt cache line"
                    );
                }
            }
        }
        if skipped > 0 {
            warn!(file = %path.display(), skipped, "cache lines ignored");
        }

        // A crash mid-write leaves a partial last line; terminate it so the
        // next append starts on a fresh line.
        if contents.last().map(|b| *b != b'\n').unwrap_or(false) {
            log.write_all(b"\n")?;
            log.flush()?;
        }

        Ok(Self { entries, log })
    }
}
