#![allow(dead_code)]

use genrepo_core::query::{Filter, OrderBy, Query};
use genrepo_core::{
    ContextFactory, ContextOptions, DbContext, DbResult, Entity, FieldError, GenericRepository,
    Migration, Navigation, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::path::Path;

pub const MUSIC_MIGRATIONS: &[Migration] = &[
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
            artist_id INTEGER NOT NULL REFERENCES artists(id),
            title TEXT NOT NULL,
            year INTEGER NOT NULL,
            UNIQUE (artist_id, title)
        );",
    ),
    Migration::new(
        3,
        "CREATE TABLE playlists (
            uuid TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL
        );",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    /// Filled by the `albums` include path.
    pub albums: Vec<Album>,
}

impl Artist {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            country: None,
            albums: Vec::new(),
        }
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }
}

const ARTIST_NAVIGATIONS: &[Navigation<Artist>] = &[Navigation {
    name: "albums",
    load: load_artist_albums,
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
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "must not be empty"));
        }
        if let Some(country) = &self.country {
            if country.len() != 2 {
                errors.push(FieldError::new("country", "must be a two-letter code"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn navigations() -> &'static [Navigation<Self>] {
        ARTIST_NAVIGATIONS
    }
}

fn load_artist_albums(conn: &Connection, artists: &mut [Artist]) -> RepoResult<()> {
    let ids = artists.iter().map(|artist| artist.id).collect::<Vec<_>>();
    let albums = Query::<Album>::new(conn)
        .filter(Filter::in_list("artist_id", ids))
        .order_by(OrderBy::asc("year").then_asc("id"))
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub id: i64,
    pub artist_id: i64,
    pub title: String,
    pub year: i64,
    /// Filled by the `artist` include path.
    pub artist: Option<Box<Artist>>,
}

impl Album {
    pub fn new(id: i64, artist_id: i64, title: &str, year: i64) -> Self {
        Self {
            id,
            artist_id,
            title: title.to_string(),
            year,
            artist: None,
        }
    }
}

const ALBUM_NAVIGATIONS: &[Navigation<Album>] = &[Navigation {
    name: "artist",
    load: load_album_artist,
}];

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
            artist: None,
        })
    }

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        if self.year <= 0 {
            return Err(vec![FieldError::new("year", "must be positive")]);
        }
        Ok(())
    }

    fn navigations() -> &'static [Navigation<Self>] {
        ALBUM_NAVIGATIONS
    }
}

fn load_album_artist(conn: &Connection, albums: &mut [Album]) -> RepoResult<()> {
    let ids = albums.iter().map(|album| album.artist_id).collect::<Vec<_>>();
    let artists = Query::<Artist>::new(conn)
        .filter(Filter::in_list("id", ids))
        .to_list()?;
    for album in albums.iter_mut() {
        album.artist = artists
            .iter()
            .find(|artist| artist.id == album.artist_id)
            .cloned()
            .map(Box::new);
    }
    Ok(())
}

/// Text-keyed entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub uuid: String,
    pub name: String,
}

impl Playlist {
    pub fn new(name: &str) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
        }
    }
}

impl Entity for Playlist {
    type Key = String;

    const TABLE: &'static str = "playlists";
    const KEY_COLUMN: &'static str = "uuid";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn key(&self) -> String {
        self.uuid.clone()
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            uuid: row.get("uuid")?,
            name: row.get("name")?,
        })
    }
}

/// Private in-memory database per context.
pub struct MemoryMusicDb;

impl ContextFactory for MemoryMusicDb {
    fn create_context() -> DbResult<DbContext> {
        DbContext::open_in_memory(MUSIC_MIGRATIONS)
    }
}

pub fn memory_repo<E: Entity>() -> GenericRepository<E, MemoryMusicDb> {
    GenericRepository::new().unwrap()
}

pub fn file_repo<E: Entity>(path: &Path) -> GenericRepository<E, MemoryMusicDb> {
    let context = DbContext::open(&ContextOptions::file(path), MUSIC_MIGRATIONS).unwrap();
    GenericRepository::with_context(context).unwrap()
}

/// Three artists, four albums; saved.
pub fn seed_catalog<E: Entity, C: ContextFactory>(repo: &mut GenericRepository<E, C>) {
    use genrepo_core::Repository;

    add_catalog(repo.context_mut().unwrap());
    repo.save().unwrap();
}

/// Tracks the seed catalog as pending inserts.
pub fn add_catalog(context: &mut DbContext) {
    let mut artists = context.set::<Artist>();
    artists.add(Artist::new(1, "Nina Simone").with_country("US")).unwrap();
    artists.add(Artist::new(2, "Fela Kuti").with_country("NG")).unwrap();
    artists.add(Artist::new(3, "Björk").with_country("IS")).unwrap();

    let mut albums = context.set::<Album>();
    albums.add(Album::new(10, 1, "Pastel Blues", 1965)).unwrap();
    albums.add(Album::new(11, 1, "Wild Is the Wind", 1966)).unwrap();
    albums.add(Album::new(20, 2, "Zombie", 1976)).unwrap();
    albums.add(Album::new(30, 3, "Homogenic", 1997)).unwrap();
}
