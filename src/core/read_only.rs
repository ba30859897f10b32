use std::future::Future;
use std::sync::Arc;

use crate::core::coordinator::IndexCoordinator;
use crate::core::error::{Error, Result};
use crate::query::ast::Query;
use crate::record::{Hits, Record};
use crate::search::sort::Sort;

/// Record-level operations shared by writable and read-only indexes
pub trait RecordIndex<R: Record>: Send + Sync {
    fn by_id(&self, id: &str) -> impl Future<Output = Result<Option<R>>> + Send;

    fn search(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
        sort: Option<&Sort>,
    ) -> impl Future<Output = Result<Hits<R>>> + Send;

    fn count(&self, query: &Query) -> impl Future<Output = Result<usize>> + Send;

    fn all(&self) -> impl Future<Output = Result<Vec<R>>> + Send;

    fn add(&self, records: Vec<R>) -> impl Future<Output = Result<Vec<R>>> + Send;

    fn update(&self, records: Vec<R>) -> impl Future<Output = Result<Vec<R>>> + Send;

    fn remove(&self, ids: &[&str]) -> impl Future<Output = Result<u64>> + Send;

    fn clear(&self) -> impl Future<Output = Result<()>> + Send;

    fn rebuild(&self, records: Vec<R>) -> impl Future<Output = Result<Vec<R>>> + Send;
}

impl<R: Record> RecordIndex<R> for IndexCoordinator<R> {
    async fn by_id(&self, id: &str) -> Result<Option<R>> {
        IndexCoordinator::by_id(self, id).await
    }

    async fn search(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
        sort: Option<&Sort>,
    ) -> Result<Hits<R>> {
        IndexCoordinator::search(self, query, offset, limit, sort).await
    }

    async fn count(&self, query: &Query) -> Result<usize> {
        IndexCoordinator::count(self, query).await
    }

    async fn all(&self) -> Result<Vec<R>> {
        IndexCoordinator::all(self).await
    }

    async fn add(&self, records: Vec<R>) -> Result<Vec<R>> {
        IndexCoordinator::add(self, records).await
    }

    async fn update(&self, records: Vec<R>) -> Result<Vec<R>> {
        IndexCoordinator::update(self, records).await
    }

    async fn remove(&self, ids: &[&str]) -> Result<u64> {
        IndexCoordinator::remove(self, ids).await
    }

    async fn clear(&self) -> Result<()> {
        IndexCoordinator::clear(self).await
    }

    async fn rebuild(&self, records: Vec<R>) -> Result<Vec<R>> {
        IndexCoordinator::rebuild(self, records).await
    }
}

/// Read-only view of a coordinator
///
/// Reads go to the wrapped coordinator; every mutator fails with
/// `UnsupportedOperation`.
#[derive(Debug)]
pub struct ReadOnlyIndex<R: Record> {
    inner: Arc<IndexCoordinator<R>>,
}

impl<R: Record> Clone for ReadOnlyIndex<R> {
    fn clone(&self) -> Self {
        ReadOnlyIndex {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Record> ReadOnlyIndex<R> {
    pub fn new(inner: Arc<IndexCoordinator<R>>) -> Self {
        ReadOnlyIndex { inner }
    }

    fn refuse<T>(op: &str) -> Result<T> {
        Err(Error::UnsupportedOperation(format!(
            "{} on a read-only index",
            op
        )))
    }
}

impl<R: Record> RecordIndex<R> for ReadOnlyIndex<R> {
    async fn by_id(&self, id: &str) -> Result<Option<R>> {
        self.inner.by_id(id).await
    }

    async fn search(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
        sort: Option<&Sort>,
    ) -> Result<Hits<R>> {
        self.inner.search(query, offset, limit, sort).await
    }

    async fn count(&self, query: &Query) -> Result<usize> {
        self.inner.count(query).await
    }

    async fn all(&self) -> Result<Vec<R>> {
        self.inner.all().await
    }

    async fn add(&self, _records: Vec<R>) -> Result<Vec<R>> {
        Self::refuse("add")
    }

    async fn update(&self, _records: Vec<R>) -> Result<Vec<R>> {
        Self::refuse("update")
    }

    async fn remove(&self, _ids: &[&str]) -> Result<u64> {
        Self::refuse("remove")
    }

    async fn clear(&self) -> Result<()> {
        Self::refuse("clear")
    }

    async fn rebuild(&self, _records: Vec<R>) -> Result<Vec<R>> {
        Self::refuse("rebuild")
    }
}
