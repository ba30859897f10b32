use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::engine::Engine;
use crate::core::error::{Error, Result};
use crate::core::read_only::ReadOnlyIndex;
use crate::core::registry::Registration;
use crate::core::stats::IndexStats;
use crate::index::document::Document;
use crate::query::ast::Query;
use crate::reader::reader_pool::ReaderPool;
use crate::reader::snapshot_reader::Snapshot;
use crate::record::{Hits, Record, codec, ensure_id};
use crate::schema::Schema;
use crate::search::sort::Sort;
use crate::storage::layout;
use crate::writer::index_writer::WriteSession;

/// Owns one logical index of record type `R`
///
/// Mutations are totally ordered by a writer lock held until the engine
/// commit returns. Reads never take that lock: they run on a snapshot of
/// the last published generation, refreshed after every commit.
pub struct IndexCoordinator<R: Record> {
    schema: Arc<Schema>,
    engine: Engine,
    readers: Arc<ReaderPool>,
    writer: Arc<Mutex<()>>,
    write_count: Arc<AtomicU64>,
    _registration: Registration,
    _record: PhantomData<fn() -> R>,
}

// A record ready to be written
struct Prepared {
    id: String,
    document: Document,
}

impl<R: Record> IndexCoordinator<R> {
    /// Opens the location of `R`'s schema under `config.storage_path`,
    /// migrating a legacy location first. Locations are identified by their
    /// canonical path.
    ///
    /// # Panics
    ///
    /// When a coordinator for the same location is already open in this
    /// process.
    pub async fn open(config: &Config) -> Result<Self> {
        let schema = R::schema();
        let legacy = schema.legacy_location(&config.storage_path);
        let requested = schema.location(&config.storage_path);
        let location =
            tokio::task::spawn_blocking(move || layout::resolve_location(&legacy, &requested))
                .await??;
        let registration = Registration::register(&location);

        let analyzers = schema.analyzers().clone();
        let target = location.clone();
        let engine =
            tokio::task::spawn_blocking(move || Engine::open_or_create(&target, analyzers))
                .await??;

        let readers = Arc::new(ReaderPool::new(engine.clone()));

        info!(
            index = schema.index_name(),
            group = schema.group_name(),
            location = %location.display(),
            "Opened coordinator"
        );

        Ok(IndexCoordinator {
            schema,
            engine,
            readers,
            writer: Arc::new(Mutex::new(())),
            write_count: Arc::new(AtomicU64::new(0)),
            _registration: registration,
            _record: PhantomData,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn location(&self) -> &Path {
        self.engine.location()
    }

    /// Successful commits since open.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Acquire)
    }

    /// Read-only view sharing this coordinator.
    pub fn read_only(self: &Arc<Self>) -> ReadOnlyIndex<R> {
        ReadOnlyIndex::new(self.clone())
    }

    // ---- reads ----

    pub async fn by_id(&self, id: &str) -> Result<Option<R>> {
        let query = self.schema.id_query(id);
        let hits = self.search(&query, 0, 1, Some(&Sort::relevance())).await?;
        Ok(hits.docs.into_iter().next())
    }

    /// Ranked page of matches. `sort` defaults to the schema's sort.
    ///
    /// `total_matched` counts every match, even past the page.
    pub async fn search(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
        sort: Option<&Sort>,
    ) -> Result<Hits<R>> {
        let snapshot = self.snapshot().await?;
        self.search_on(snapshot, query, offset, limit, sort).await
    }

    /// Matches `text` against the default search field.
    pub async fn search_text(&self, text: &str, offset: usize, limit: usize) -> Result<Hits<R>> {
        let query = self.schema.query().text(text);
        self.search(&query, offset, limit, None).await
    }

    pub async fn count(&self, query: &Query) -> Result<usize> {
        let snapshot = self.snapshot().await?;
        let query = query.clone();
        tokio::task::spawn_blocking(move || snapshot.count(&query)).await?
    }

    /// Every live record in the schema's default order.
    pub async fn all(&self) -> Result<Vec<R>> {
        let snapshot = self.snapshot().await?;
        let limit = snapshot.doc_count() as usize;
        let hits = self
            .search_on(snapshot, &Query::MatchAll, 0, limit, None)
            .await?;
        Ok(hits.docs)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let snapshot = self.snapshot().await?;
        let generation = snapshot.generation();
        Ok(IndexStats {
            live_docs: generation.doc_count(),
            segments: generation.segments.len(),
            deleted_docs: generation.deleted_count(),
            generation: generation.version,
            write_count: self.write_count(),
        })
    }

    async fn search_on(
        &self,
        snapshot: Snapshot,
        query: &Query,
        offset: usize,
        limit: usize,
        sort: Option<&Sort>,
    ) -> Result<Hits<R>> {
        let query = query.clone();
        let sort = sort.unwrap_or(self.schema.default_sort()).clone();
        let schema = self.schema.clone();

        tokio::task::spawn_blocking(move || {
            let top = snapshot.search(&query, offset.saturating_add(limit), &sort)?;
            let docs = top
                .hits
                .iter()
                .skip(offset)
                .map(|hit| codec::decode(&hit.document, &schema))
                .collect::<Result<Vec<R>>>()?;
            Ok(Hits {
                total_matched: top.total_hits,
                docs,
            })
        })
        .await?
    }

    // ---- writes ----

    /// Inserts new records. Fails with `AlreadyExists` when any id is taken,
    /// including twice within `records`; nothing is written then.
    /// Records without an id get a fresh one.
    pub async fn add(&self, records: Vec<R>) -> Result<Vec<R>> {
        let (records, prepared) = self.prepare(records)?;
        let id_field = self.schema.id_field().to_string();

        self.write("add", move |session| {
            for Prepared { id, document } in prepared {
                if session.contains_term(&id_field, &id) {
                    return Err(Error::AlreadyExists(id));
                }
                session.add_document(document)?;
            }
            Ok(())
        })
        .await?;
        Ok(records)
    }

    /// Inserts or replaces records by id, in one commit.
    pub async fn update(&self, records: Vec<R>) -> Result<Vec<R>> {
        let (records, prepared) = self.prepare(records)?;
        let id_field = self.schema.id_field().to_string();

        self.write("update", move |session| {
            for Prepared { id, document } in prepared {
                session.delete_by_term(&id_field, &id);
                session.add_document(document)?;
            }
            Ok(())
        })
        .await?;
        Ok(records)
    }

    /// Deletes records by id. Unknown ids are ignored.
    pub async fn remove(&self, ids: &[&str]) -> Result<u64> {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let id_field = self.schema.id_field().to_string();

        self.write("remove", move |session| {
            Ok(ids
                .iter()
                .map(|id| session.delete_by_term(&id_field, id))
                .sum())
        })
        .await
    }

    /// Deletes every record. The location stays initialized.
    pub async fn clear(&self) -> Result<()> {
        self.write("clear", |session| {
            session.delete_all();
            Ok(())
        })
        .await
    }

    /// Replaces the whole contents with `records` and forgets every
    /// recorded field type. Later records win over earlier ones with the
    /// same id.
    pub async fn rebuild(&self, records: Vec<R>) -> Result<Vec<R>> {
        let (records, prepared) = self.prepare(records)?;
        let id_field = self.schema.id_field().to_string();
        let count = prepared.len();

        self.write("rebuild", move |session| {
            session.delete_all();
            session.reset_manifest();
            for Prepared { id, document } in prepared {
                session.delete_by_term(&id_field, &id);
                session.add_document(document)?;
            }
            Ok(())
        })
        .await?;

        info!(location = %self.location().display(), records = count, "Rebuilt index");
        Ok(records)
    }

    /// Assigns a missing id and runs the checks a write would run, without
    /// writing. Returns the record's id.
    pub fn validate(&self, record: &mut R) -> Result<String> {
        self.prepare_one(record).map(|prepared| prepared.id)
    }

    // Validation and encoding happen before the writer lock is taken
    fn prepare(&self, mut records: Vec<R>) -> Result<(Vec<R>, Vec<Prepared>)> {
        let prepared = records
            .iter_mut()
            .map(|item| self.prepare_one(item))
            .collect::<Result<Vec<_>>>()?;
        Ok((records, prepared))
    }

    fn prepare_one(&self, record: &mut R) -> Result<Prepared> {
        let id = ensure_id(record)?;
        self.schema.check_constraints(record)?;
        let document = codec::encode(record, &self.schema, None)?;
        Ok(Prepared { id, document })
    }

    /// Runs `apply` in a write session and commits it, all under the writer
    /// lock. The blocking task finishes even if the caller stops waiting.
    async fn write<T, F>(&self, op: &'static str, apply: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut WriteSession) -> Result<T> + Send + 'static,
    {
        let engine = self.engine.clone();
        let writer = self.writer.clone();
        let readers = self.readers.clone();
        let write_count = self.write_count.clone();

        tokio::task::spawn_blocking(move || {
            let _guard = writer.lock();
            let mut session = engine.begin_write()?;
            let value = apply(&mut session)?;
            let info = session.commit()?;

            write_count.fetch_add(1, Ordering::AcqRel);
            readers.signal_refresh(info.version);

            debug!(
                op,
                location = %engine.location().display(),
                generation = info.version,
                added = info.added,
                deleted = info.deleted,
                "Write committed"
            );
            Ok(value)
        })
        .await?
    }

    // ---- snapshots ----

    async fn snapshot(&self) -> Result<Snapshot> {
        match self.readers.acquire() {
            Err(Error::NotInitialized(location)) => {
                self.initialize(location).await?;
                self.readers.acquire()
            }
            other => other,
        }
    }

    // Empty commit so the location has a generation to publish
    async fn initialize(&self, location: PathBuf) -> Result<()> {
        warn!(location = %location.display(), "Index not initialized, creating it");
        self.write("initialize", |_| Ok(())).await
    }
}

impl<R: Record> std::fmt::Debug for IndexCoordinator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCoordinator")
            .field("index", &self.schema.index_name())
            .field("group", &self.schema.group_name())
            .field("location", &self.location())
            .field("write_count", &self.write_count())
            .finish()
    }
}
