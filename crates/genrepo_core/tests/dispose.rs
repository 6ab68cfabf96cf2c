mod common;

use common::{Artist, MUSIC_MIGRATIONS};
use genrepo_core::{
    ContextFactory, DbContext, DbResult, Entity, GenericRepository, QueryOptions, RepoError,
    Repository,
};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

thread_local! {
    static CREATED: Cell<usize> = const { Cell::new(0) };
    static RELEASED: Cell<usize> = const { Cell::new(0) };
}

/// Counts context hand-outs and releases on the current thread.
struct CountingDb;

impl ContextFactory for CountingDb {
    fn create_context() -> DbResult<DbContext> {
        CREATED.with(|count| count.set(count.get() + 1));
        DbContext::open_in_memory(MUSIC_MIGRATIONS)
    }

    fn release_context(context: DbContext) -> DbResult<()> {
        RELEASED.with(|count| count.set(count.get() + 1));
        context.close()
    }
}

fn created() -> usize {
    CREATED.with(Cell::get)
}

fn released() -> usize {
    RELEASED.with(Cell::get)
}

type CountingRepo = GenericRepository<Artist, CountingDb>;

#[test]
fn constructor_creates_exactly_one_context() {
    let before = created();
    let _repo = CountingRepo::new().unwrap();
    assert_eq!(created(), before + 1);
}

#[test]
fn dispose_twice_releases_once() {
    let mut repo = CountingRepo::new().unwrap();
    let before = released();

    repo.dispose().unwrap();
    repo.dispose().unwrap();
    assert_eq!(released(), before + 1);
    assert!(repo.is_disposed());

    drop(repo);
    assert_eq!(released(), before + 1);
}

#[test]
fn drop_releases_the_context() {
    let before = released();
    {
        let mut repo = CountingRepo::new().unwrap();
        repo.insert(Artist::new(1, "Unsaved")).unwrap();
    }
    assert_eq!(released(), before + 1);
}

#[test]
fn operations_after_dispose_fail_with_disposed() {
    let mut repo = CountingRepo::new().unwrap();
    repo.dispose().unwrap();

    assert!(matches!(
        repo.get(QueryOptions::new()),
        Err(RepoError::Disposed)
    ));
    assert!(matches!(repo.get_by_id(&1), Err(RepoError::Disposed)));
    assert!(matches!(repo.get_count(None), Err(RepoError::Disposed)));
    assert!(matches!(
        repo.insert(Artist::new(1, "Late")),
        Err(RepoError::Disposed)
    ));
    assert!(matches!(
        repo.update(Artist::new(1, "Late")),
        Err(RepoError::Disposed)
    ));
    assert!(matches!(
        repo.delete(Artist::new(1, "Late")),
        Err(RepoError::Disposed)
    ));
    assert!(matches!(repo.delete_by_id(&1), Err(RepoError::Disposed)));
    assert!(matches!(repo.save(), Err(RepoError::Disposed)));
    assert!(repo.get_queryable(QueryOptions::new()).is_err());
    assert!(repo.context().is_err());
}

#[test]
fn unsaved_changes_are_dropped_on_dispose() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("music.db");

    let mut repo = common::file_repo::<Artist>(&path);
    repo.insert(Artist::new(1, "Saved")).unwrap();
    repo.save().unwrap();
    repo.insert(Artist::new(2, "Never Saved")).unwrap();
    repo.dispose().unwrap();

    let conn = Connection::open(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM artists;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn rejected_context_is_released_through_factory() {
    let before = released();
    let bare = DbContext::from_connection(Connection::open_in_memory().unwrap());

    assert!(CountingRepo::with_context(bare).is_err());
    assert_eq!(released(), before + 1);
}

/// Artist row whose decoder panics on the name `boom`.
#[derive(Debug, Clone, PartialEq)]
struct Fragile {
    id: i64,
    name: String,
}

impl Entity for Fragile {
    type Key = i64;

    const TABLE: &'static str = "artists";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn key(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let name: String = row.get("name")?;
        assert_ne!(name, "boom", "decoder blew up");
        Ok(Self {
            id: row.get("id")?,
            name,
        })
    }
}

// Counted across threads: abandoned contexts are released on the blocking pool.
static POOL_RELEASED: AtomicUsize = AtomicUsize::new(0);

struct PoolCountingDb;

impl ContextFactory for PoolCountingDb {
    fn create_context() -> DbResult<DbContext> {
        DbContext::open_in_memory(MUSIC_MIGRATIONS)
    }

    fn release_context(context: DbContext) -> DbResult<()> {
        POOL_RELEASED.fetch_add(1, Ordering::SeqCst);
        context.close()
    }
}

#[tokio::test]
async fn panicking_async_read_releases_the_context_through_factory() {
    let mut repo = GenericRepository::<Fragile, PoolCountingDb>::new().unwrap();
    repo.insert(Fragile {
        id: 1,
        name: "boom".to_string(),
    })
    .unwrap();
    assert_eq!(repo.save().unwrap(), 1);

    let before = POOL_RELEASED.load(Ordering::SeqCst);
    let err = repo.get_async(QueryOptions::new()).await.unwrap_err();
    assert!(matches!(err, RepoError::BackgroundTask(_)), "unexpected error: {err}");
    assert!(repo.is_disposed());
    assert_eq!(POOL_RELEASED.load(Ordering::SeqCst), before + 1);

    repo.dispose().unwrap();
    drop(repo);
    assert_eq!(POOL_RELEASED.load(Ordering::SeqCst), before + 1);
}
