//! Repository contract and the context-owning generic implementation.
//!
//! # Responsibility
//! - Provide stable CRUD and query APIs for any `Entity`.
//! - Keep async callers off the blocking SQLite round-trip.
//!
//! # Invariants
//! - The context is created once in the constructor and released through
//!   `ContextFactory::release_context` at most once.
//! - After release every operation fails with `RepoError::Disposed`.

use crate::context::{ContextFactory, DbContext};
use crate::db::ensure_table;
use crate::model::Entity;
use crate::query::{Filter, Query, QueryOptions};
use crate::repo::{RepoError, RepoResult};
use async_trait::async_trait;
use log::{error, info, warn};
use std::marker::PhantomData;

/// Data-access operations every entity repository supports.
#[async_trait]
pub trait Repository<E: Entity>: Send {
    /// Materialized rows matching `options`.
    fn get(&self, options: QueryOptions) -> RepoResult<Vec<E>>;

    /// Same composition as `get`, left unexecuted for further narrowing.
    fn get_queryable(&self, options: QueryOptions) -> RepoResult<Query<'_, E>>;

    /// Tracked entity or store row for `id`.
    fn get_by_id(&mut self, id: &E::Key) -> RepoResult<Option<E>>;

    fn get_count(&self, filter: Option<Filter>) -> RepoResult<usize>;

    fn insert(&mut self, entity: E) -> RepoResult<()>;

    /// Resolves `id` and marks it for deletion.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when `id` resolves to nothing.
    fn delete_by_id(&mut self, id: &E::Key) -> RepoResult<()>;

    fn delete(&mut self, entity: E) -> RepoResult<()>;

    /// Marks `entity` for a full-row update.
    fn update(&mut self, entity: E) -> RepoResult<()>;

    /// Commits pending changes; returns rows written.
    fn save(&mut self) -> RepoResult<usize>;

    async fn get_async(&mut self, options: QueryOptions) -> RepoResult<Vec<E>>;

    async fn get_by_id_async(&mut self, id: E::Key) -> RepoResult<Option<E>>;

    async fn save_async(&mut self) -> RepoResult<usize>;

    /// Releases the owned context. Later calls do nothing.
    fn dispose(&mut self) -> RepoResult<()>;
}

/// Repository for `E` over a context built by `C`.
///
/// Dropping the repository disposes it.
pub struct GenericRepository<E: Entity, C: ContextFactory> {
    context: Option<DbContext>,
    _types: PhantomData<fn() -> (E, C)>,
}

impl<E: Entity, C: ContextFactory> GenericRepository<E, C> {
    /// Builds a repository over a fresh context from `C`.
    pub fn new() -> RepoResult<Self> {
        Self::with_context(C::create_context()?)
    }

    /// Builds a repository over `context`, taking ownership of it.
    ///
    /// # Errors
    /// - `DbError::MissingRequiredTable`/`MissingRequiredColumn` when the
    ///   connection does not carry `E`'s table shape.
    /// - `DbError::InvalidIdentifier` when `E` declares unusable names.
    pub fn with_context(context: DbContext) -> RepoResult<Self> {
        let mut columns = Vec::with_capacity(E::COLUMNS.len() + 1);
        columns.push(E::KEY_COLUMN);
        columns.extend_from_slice(E::COLUMNS);
        if let Err(err) = ensure_table(context.connection(), E::TABLE, &columns) {
            // Rejected contexts still go back through the factory.
            if let Err(release_err) = C::release_context(context) {
                warn!(
                    "event=context_release module=repo status=error table={} error={}",
                    E::TABLE,
                    release_err
                );
            }
            return Err(err.into());
        }

        Ok(Self {
            context: Some(context),
            _types: PhantomData,
        })
    }

    pub fn context(&self) -> RepoResult<&DbContext> {
        self.context.as_ref().ok_or(RepoError::Disposed)
    }

    pub fn context_mut(&mut self) -> RepoResult<&mut DbContext> {
        self.context.as_mut().ok_or(RepoError::Disposed)
    }

    pub fn is_disposed(&self) -> bool {
        self.context.is_none()
    }

    /// Runs `work` on tokio's blocking pool with the context moved in, and
    /// restores the context when the work completes.
    ///
    /// If the work panics, or the caller drops the future before it
    /// completes, the context never comes back. It is released through `C`
    /// on the blocking thread and the repository stays disposed.
    ///
    /// Must be awaited inside a tokio runtime.
    async fn run_blocking<T, F>(&mut self, operation: &'static str, work: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DbContext) -> RepoResult<T> + Send + 'static,
    {
        let mut loan = LoanedContext::<C>::new(self.context.take().ok_or(RepoError::Disposed)?);
        let joined = tokio::task::spawn_blocking(move || {
            let result = match loan.context.as_mut() {
                Some(context) => work(context),
                None => Err(RepoError::Disposed),
            };
            (loan, result)
        })
        .await;

        match joined {
            Ok((mut loan, result)) => {
                self.context = loan.context.take();
                result
            }
            Err(err) => {
                error!(
                    "event=async_op module=repo status=error op={operation} table={} error={}",
                    E::TABLE,
                    err
                );
                Err(RepoError::BackgroundTask(err.to_string()))
            }
        }
    }
}

/// Context handed to a blocking task. Released through `C` unless the
/// repository takes it back.
struct LoanedContext<C: ContextFactory> {
    context: Option<DbContext>,
    _factory: PhantomData<fn() -> C>,
}

impl<C: ContextFactory> LoanedContext<C> {
    fn new(context: DbContext) -> Self {
        Self {
            context: Some(context),
            _factory: PhantomData,
        }
    }
}

impl<C: ContextFactory> Drop for LoanedContext<C> {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };
        warn!("event=context_release module=repo status=abandoned reason=async_op_lost");
        if let Err(err) = C::release_context(context) {
            warn!("event=context_release module=repo status=error error={err}");
        }
    }
}

#[async_trait]
impl<E: Entity, C: ContextFactory> Repository<E> for GenericRepository<E, C> {
    fn get(&self, options: QueryOptions) -> RepoResult<Vec<E>> {
        self.get_queryable(options)?.to_list()
    }

    fn get_queryable(&self, options: QueryOptions) -> RepoResult<Query<'_, E>> {
        Ok(Query::with_options(self.context()?.connection(), options))
    }

    fn get_by_id(&mut self, id: &E::Key) -> RepoResult<Option<E>> {
        self.context_mut()?.set::<E>().find(id)
    }

    fn get_count(&self, filter: Option<Filter>) -> RepoResult<usize> {
        let options = QueryOptions {
            filter,
            ..QueryOptions::default()
        };
        self.get_queryable(options)?.count()
    }

    fn insert(&mut self, entity: E) -> RepoResult<()> {
        self.context_mut()?.set::<E>().add(entity)
    }

    fn delete_by_id(&mut self, id: &E::Key) -> RepoResult<()> {
        match self.get_by_id(id)? {
            Some(entity) => self.delete(entity),
            None => Err(RepoError::NotFound {
                table: E::TABLE,
                key: id.to_string(),
            }),
        }
    }

    fn delete(&mut self, entity: E) -> RepoResult<()> {
        self.context_mut()?.set::<E>().remove(entity);
        Ok(())
    }

    fn update(&mut self, entity: E) -> RepoResult<()> {
        self.context_mut()?.set::<E>().update(entity);
        Ok(())
    }

    fn save(&mut self) -> RepoResult<usize> {
        self.context_mut()?.save_changes()
    }

    async fn get_async(&mut self, options: QueryOptions) -> RepoResult<Vec<E>> {
        self.run_blocking("get", move |context| {
            Query::<E>::with_options(context.connection(), options).to_list()
        })
        .await
    }

    async fn get_by_id_async(&mut self, id: E::Key) -> RepoResult<Option<E>> {
        self.run_blocking("get_by_id", move |context| context.set::<E>().find(&id))
            .await
    }

    async fn save_async(&mut self) -> RepoResult<usize> {
        self.run_blocking("save", |context| context.save_changes())
            .await
    }

    fn dispose(&mut self) -> RepoResult<()> {
        let Some(context) = self.context.take() else {
            return Ok(());
        };
        C::release_context(context)?;
        info!(
            "event=context_release module=repo status=ok table={}",
            E::TABLE
        );
        Ok(())
    }
}

impl<E: Entity, C: ContextFactory> Drop for GenericRepository<E, C> {
    fn drop(&mut self) {
        if let Err(err) = Repository::<E>::dispose(self) {
            warn!(
                "event=context_release module=repo status=error table={} error={}",
                E::TABLE,
                err
            );
        }
    }
}
