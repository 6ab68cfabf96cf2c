//! Demo record types and schema for the `genrepo` executable.

use genrepo_core::query::{Filter, OrderBy, Query};
use genrepo_core::{
    ContextFactory, DbContext, DbResult, Entity, FieldError, Migration, Navigation, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

pub const CATALOG_MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "CREATE TABLE artists (
            id INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            country TEXT
        );",
    ),
    Migration::new(
        2,
        "CREATE TABLE albums (
            id INTEGER PRIMARY KEY NOT NULL,
            artist_id INTEGER NOT NULL REFERENCES artists(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            year INTEGER NOT NULL
        );
        CREATE INDEX idx_albums_artist_id ON albums(artist_id);",
    ),
];

/// In-memory catalog used when no `--db` path is given.
pub struct CatalogDb;

impl ContextFactory for CatalogDb {
    fn create_context() -> DbResult<DbContext> {
        DbContext::open_in_memory(CATALOG_MIGRATIONS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    pub albums: Vec<Album>,
}

impl Artist {
    pub fn new(id: i64, name: &str, country: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            country: Some(country.to_string()),
            albums: Vec::new(),
        }
    }
}

const ARTIST_NAVIGATIONS: &[Navigation<Artist>] = &[Navigation {
    name: "albums",
    load: load_albums,
}];

impl Entity for Artist {
    type Key = i64;

    const TABLE: &'static str = "artists";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["name", "country"];

    fn key(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone()), self.country.clone().into()]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            country: row.get("country")?,
            albums: Vec::new(),
        })
    }

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        if self.name.trim().is_empty() {
            return Err(vec![FieldError::new("name", "must not be empty")]);
        }
        Ok(())
    }

    fn navigations() -> &'static [Navigation<Self>] {
        ARTIST_NAVIGATIONS
    }
}

fn load_albums(conn: &Connection, artists: &mut [Artist]) -> RepoResult<()> {
    let ids = artists.iter().map(|artist| artist.id).collect::<Vec<_>>();
    let albums = Query::<Album>::new(conn)
        .filter(Filter::in_list("artist_id", ids))
        .order_by(OrderBy::asc("year"))
        .to_list()?;
    for artist in artists.iter_mut() {
        artist.albums = albums
            .iter()
            .filter(|album| album.artist_id == artist.id)
            .cloned()
            .collect();
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub id: i64,
    pub artist_id: i64,
    pub title: String,
    pub year: i64,
}

impl Album {
    pub fn new(id: i64, artist_id: i64, title: &str, year: i64) -> Self {
        Self {
            id,
            artist_id,
            title: title.to_string(),
            year,
        }
    }
}

impl Entity for Album {
    type Key = i64;

    const TABLE: &'static str = "albums";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["artist_id", "title", "year"];

    fn key(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.artist_id),
            Value::Text(self.title.clone()),
            Value::Integer(self.year),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            artist_id: row.get("artist_id")?,
            title: row.get("title")?,
            year: row.get("year")?,
        })
    }
}

/// Rows written on first run against an empty store.
pub fn seed() -> (Vec<Artist>, Vec<Album>) {
    let artists = vec![
        Artist::new(1, "Miles Davis", "US"),
        Artist::new(2, "Caetano Veloso", "BR"),
        Artist::new(3, "Tinariwen", "ML"),
    ];
    let albums = vec![
        Album::new(10, 1, "Kind of Blue", 1959),
        Album::new(11, 1, "Bitches Brew", 1970),
        Album::new(20, 2, "Transa", 1972),
        Album::new(30, 3, "Amassakoul", 2004),
    ];
    (artists, albums)
}
