//! Durable history of completed generations, backed by embedded SurrealDB.

use std::path::Path;
use std::sync::Arc;
use ag_core::{GenerationResult, HistoryRecord, InputSummary, SourceTag};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, SurrealKv};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use crate::collector::ResultSink;

const HISTORY: &str = "history";
const META: &str = "meta";
const SEQ_KEY: &str = "history_seq";
const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("history database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("history storage error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryOrder {
    Oldest,
    #[default]
    Newest,
}

impl HistoryOrder {
    fn direction(self) -> &'static str {
        match self {
            Self::Oldest => "ASC",
            Self::Newest => "DESC",
        }
    }
}

/// A history entry before it has been given an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub reference_name: String,
    pub source: SourceTag,
    pub prompt_text: Option<String>,
    pub replacement_count: Option<usize>,
    pub images: Vec<String>,
}

impl NewHistoryRecord {
    pub fn from_result(result: &GenerationResult, summary: &InputSummary) -> Self {
        Self {
            timestamp: Utc::now(),
            reference_name: summary.reference_name.clone(),
            source: result.source,
            prompt_text: summary.prompt_text.clone(),
            replacement_count: summary.replacement_count,
            images: result.images.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryRow {
    seq: i64,
    timestamp_ms: i64,
    reference_name: String,
    source: SourceTag,
    prompt_text: Option<String>,
    replacement_count: Option<i64>,
    images: Vec<String>,
}

impl From<HistoryRow> for HistoryRecord {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: row.seq as u64,
            timestamp: DateTime::from_timestamp_millis(row.timestamp_ms).unwrap_or_default(),
            reference_name: row.reference_name,
            source: row.source,
            prompt_text: row.prompt_text,
            replacement_count: row.replacement_count.map(|n| n as usize),
            images: row.images,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeqMeta {
    last: i64,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    db: Surreal<Db>,
    seq_lock: Arc<Mutex<()>>,
    page_size: usize,
}

impl HistoryStore {
    /// Open (or create) a file-backed history database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening history database");
        tokio::fs::create_dir_all(path).await?;

        let db = Surreal::new::<SurrealKv>(path.to_path_buf()).await?;
        Self::init(db).await
    }

    pub async fn open_in_memory() -> Result<Self, HistoryError> {
        let db = Surreal::new::<Mem>(()).await?;
        Self::init(db).await
    }

    async fn init(db: Surreal<Db>) -> Result<Self, HistoryError> {
        db.use_ns("adgen").use_db("history").await?;
        db.query("DEFINE INDEX IF NOT EXISTS history_source ON TABLE history COLUMNS source")
            .query("DEFINE INDEX IF NOT EXISTS history_reference ON TABLE history COLUMNS reference_name")
            .query("DEFINE INDEX IF NOT EXISTS history_timestamp ON TABLE history COLUMNS timestamp_ms, seq")
            .await?
            .check()?;

        Ok(Self {
            db,
            seq_lock: Arc::new(Mutex::new(())),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Append a record under the next id. Ids are never handed out twice.
    pub async fn record(&self, draft: NewHistoryRecord) -> Result<HistoryRecord, HistoryError> {
        let _guard = self.seq_lock.lock().await;

        let meta: Option<SeqMeta> = self.db.select((META, SEQ_KEY)).await?;
        let seq = meta.map(|m| m.last).unwrap_or(0) + 1;
        let _: Option<SeqMeta> = self
            .db
            .upsert((META, SEQ_KEY))
            .content(SeqMeta { last: seq })
            .await?;

        let row = HistoryRow {
            seq,
            timestamp_ms: draft.timestamp.timestamp_millis(),
            reference_name: draft.reference_name,
            source: draft.source,
            prompt_text: draft.prompt_text,
            replacement_count: draft.replacement_count.map(|n| n as i64),
            images: draft.images,
        };
        let _: Option<HistoryRow> = self.db.create((HISTORY, seq)).content(row.clone()).await?;

        debug!(id = seq, source = %row.source, "history record stored");
        Ok(row.into())
    }

    pub fn list_all(&self, order: HistoryOrder) -> HistoryListing {
        HistoryListing {
            db: self.db.clone(),
            order,
            page_size: self.page_size,
        }
    }

    pub async fn get(&self, id: u64) -> Result<Option<HistoryRecord>, HistoryError> {
        let row: Option<HistoryRow> = self.db.select((HISTORY, id as i64)).await?;
        Ok(row.map(Into::into))
    }

    pub async fn find_by_source(&self, source: SourceTag) -> Result<Vec<HistoryRecord>, HistoryError> {
        let mut response = self
            .db
            .query("SELECT * FROM history WHERE source = $source ORDER BY timestamp_ms DESC, seq DESC")
            .bind(("source", source))
            .await?;
        let rows: Vec<HistoryRow> = response.take(0)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn find_by_reference(&self, reference_name: &str) -> Result<Vec<HistoryRecord>, HistoryError> {
        let mut response = self
            .db
            .query("SELECT * FROM history WHERE reference_name = $name ORDER BY timestamp_ms DESC, seq DESC")
            .bind(("name", reference_name.to_string()))
            .await?;
        let rows: Vec<HistoryRow> = response.take(0)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Deleting an id that does not exist is a no-op.
    pub async fn delete_by_id(&self, id: u64) -> Result<(), HistoryError> {
        let removed: Option<HistoryRow> = self.db.delete((HISTORY, id as i64)).await?;
        debug!(id, existed = removed.is_some(), "history record deleted");
        Ok(())
    }

    /// Drop every record. The id high-water mark is kept.
    pub async fn clear(&self) -> Result<(), HistoryError> {
        self.db.query("DELETE history").await?.check()?;
        info!("history cleared");
        Ok(())
    }
}

#[async_trait]
impl ResultSink for HistoryStore {
    async fn accept(&self, result: &GenerationResult, summary: &InputSummary) -> anyhow::Result<()> {
        self.record(NewHistoryRecord::from_result(result, summary)).await?;
        Ok(())
    }
}

/// A restartable view over the whole history.
#[derive(Debug, Clone)]
pub struct HistoryListing {
    db: Surreal<Db>,
    order: HistoryOrder,
    page_size: usize,
}

impl HistoryListing {
    /// Each call starts a fresh pass that reads pages lazily.
    pub fn stream(&self) -> impl Stream<Item = Result<HistoryRecord, HistoryError>> + Send + 'static {
        let db = self.db.clone();
        let query = format!(
            "SELECT * FROM history ORDER BY timestamp_ms {dir}, seq {dir} LIMIT $limit START $start",
            dir = self.order.direction()
        );
        let page_size = self.page_size;

        stream::try_unfold(Some(0usize), move |start| {
            let db = db.clone();
            let query = query.clone();
            async move {
                let Some(start) = start else {
                    return Ok::<_, HistoryError>(None);
                };
                let mut response = db
                    .query(query)
                    .bind(("limit", page_size as i64))
                    .bind(("start", start as i64))
                    .await?;
                let rows: Vec<HistoryRow> = response.take(0)?;
                if rows.is_empty() {
                    return Ok(None);
                }

                let next = (rows.len() == page_size).then_some(start + rows.len());
                let page = rows
                    .into_iter()
                    .map(|row| Ok::<_, HistoryError>(HistoryRecord::from(row)));
                Ok(Some((stream::iter(page.collect::<Vec<_>>()), next)))
            }
        })
        .try_flatten()
    }

    pub async fn collect(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        self.stream().try_collect().await
    }
}
