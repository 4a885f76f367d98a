use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

/// One tagged lesson or metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub source: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeRecord {
    pub fn new(content: impl Into<String>, category: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            category: category.into(),
            tags: Vec::new(),
            source: "agent".to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            created_at: Utc::now(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Append-only persistence for learned records. Callers log failures and
/// carry on; nothing in the execution path depends on a write succeeding.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn append(&self, record: KnowledgeRecord) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryKnowledgeStore {
    records: Mutex<Vec<KnowledgeRecord>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<KnowledgeRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn append(&self, record: KnowledgeRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("knowledge store lock poisoned"))?
            .push(record);
        Ok(())
    }
}

/// One JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlKnowledgeStore {
    path: PathBuf,
}

impl JsonlKnowledgeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the file. Lines that fail to decode are skipped.
    pub async fn load(&self) -> anyhow::Result<Vec<KnowledgeRecord>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                serde_json::from_str(line)
                    .inspect_err(|e| tracing::warn!(error = %e, "skipping corrupt knowledge line"))
                    .ok()
            })
            .collect())
    }
}

#[async_trait]
impl KnowledgeStore for JsonlKnowledgeStore {
    async fn append(&self, record: KnowledgeRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_keeps_order() {
        let store = InMemoryKnowledgeStore::new();
        store
            .append(KnowledgeRecord::new("first", "lessons_learned", 0.8))
            .await
            .unwrap();
        store
            .append(KnowledgeRecord::new("second", "performance_metrics", 0.9))
            .await
            .unwrap();

        let contents: Vec<String> = store.records().into_iter().map(|r| r.content).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn jsonl_store_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlKnowledgeStore::new(dir.path().join("nested/knowledge.jsonl"));

        store
            .append(KnowledgeRecord::new("a", "lessons_learned", 0.8).with_tags(["learning"]))
            .await
            .unwrap();
        store
            .append(KnowledgeRecord::new("b", "lessons_learned", 0.8))
            .await
            .unwrap();

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert_eq!(raw.lines().count(), 2);

        let records = store.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tags, vec!["learning"]);
        assert_eq!(records[1].content, "b");
    }

    #[tokio::test]
    async fn jsonl_load_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.jsonl");
        let good = serde_json::to_string(&KnowledgeRecord::new("ok", "c", 1.0)).unwrap();
        tokio::fs::write(&path, format!("{good}\nnot json\n\n")).await.unwrap();

        let records = JsonlKnowledgeStore::new(&path).load().await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = JsonlKnowledgeStore::new("/nonexistent/dir/k.jsonl");
        let records = tokio_test::block_on(store.load()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn confidence_is_clamped() {
        assert!((KnowledgeRecord::new("x", "c", 3.0).confidence - 1.0).abs() < f64::EPSILON);
    }
}
