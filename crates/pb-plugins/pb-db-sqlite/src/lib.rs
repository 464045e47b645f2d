//! # pb-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `pb-core` domain models. Photo counters are stored denormalized and
//! moved in the same transaction that appends the vote.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::Utc;
use pb_core::models::{Group, GroupId, NewGroup, NewPhoto, NewVote, Photo, PhotoId, UserId, Vote, VoteId};
use pb_core::traits::{GroupRepo, PhotoRepo};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

const SCHEMA: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS groups (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        description TEXT,
        is_public   INTEGER NOT NULL DEFAULT 1,
        created_by  TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS photos (
        id          TEXT PRIMARY KEY,
        group_id    TEXT NOT NULL REFERENCES groups(id),
        owner_id    TEXT NOT NULL,
        title       TEXT,
        image_url   TEXT NOT NULL,
        votes_count INTEGER NOT NULL DEFAULT 0 CHECK (votes_count >= 0),
        wins_count  INTEGER NOT NULL DEFAULT 0 CHECK (wins_count >= 0 AND wins_count <= votes_count),
        created_at  TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS votes (
        id              TEXT PRIMARY KEY,
        group_id        TEXT NOT NULL REFERENCES groups(id),
        voter_id        TEXT NOT NULL,
        winner_photo_id TEXT NOT NULL REFERENCES photos(id),
        loser_photo_id  TEXT NOT NULL REFERENCES photos(id),
        created_at      TEXT NOT NULL,
        CHECK (winner_photo_id <> loser_photo_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_photos_group ON photos(group_id)",
    "CREATE INDEX IF NOT EXISTS idx_votes_group ON votes(group_id)",
];

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects and creates the schema if needed.
    ///
    /// In-memory databases are pinned to a single long-lived connection,
    /// since every SQLite connection to `:memory:` opens its own database.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        }
        .connect_with(options)
        .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url, "sqlite store ready");
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Stores an uploaded photo with zeroed counters.
    pub async fn insert_photo(&self, photo: NewPhoto) -> anyhow::Result<Photo> {
        let photo = Photo {
            id: PhotoId::generate(),
            group_id: photo.group_id,
            owner_id: photo.owner_id,
            title: photo.title,
            image_url: photo.image_url,
            votes_count: 0,
            wins_count: 0,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO photos (id, group_id, owner_id, title, image_url, votes_count, wins_count, created_at) VALUES (?, ?, ?, ?, ?, 0, 0, ?)")
            .bind(photo.id.as_str())
            .bind(photo.group_id.as_str())
            .bind(photo.owner_id.as_str())
            .bind(photo.title.as_deref())
            .bind(&photo.image_url)
            .bind(photo.created_at)
            .execute(&self.pool)
            .await?;
        Ok(photo)
    }

    pub async fn get_photo(&self, id: &PhotoId) -> anyhow::Result<Option<Photo>> {
        sqlx::query("SELECT * FROM photos WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(photo_from_row)
            .transpose()
    }

    /// The group's vote log, oldest first.
    pub async fn votes_for_group(&self, group_id: &GroupId) -> anyhow::Result<Vec<Vote>> {
        sqlx::query("SELECT * FROM votes WHERE group_id = ? ORDER BY created_at ASC, id ASC")
            .bind(group_id.as_str())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(vote_from_row)
            .collect()
    }

    /// Recomputes every photo counter of the group from the vote log.
    pub async fn rebuild_tallies(&self, group_id: &GroupId) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE photos SET
                wins_count  = (SELECT COUNT(*) FROM votes v WHERE v.winner_photo_id = photos.id),
                votes_count = (SELECT COUNT(*) FROM votes v
                               WHERE v.winner_photo_id = photos.id OR v.loser_photo_id = photos.id)
             WHERE group_id = ?",
        )
        .bind(group_id.as_str())
        .execute(&self.pool)
        .await?;

        info!(group_id = %group_id, photos = result.rows_affected(), "tallies rebuilt from vote log");
        Ok(result.rows_affected())
    }
}

fn count(row: &SqliteRow, column: &str) -> anyhow::Result<u32> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).with_context(|| format!("{column} out of range: {raw}"))
}

fn photo_from_row(row: &SqliteRow) -> anyhow::Result<Photo> {
    Ok(Photo {
        id: PhotoId::new(row.try_get::<String, _>("id")?),
        group_id: GroupId::new(row.try_get::<String, _>("group_id")?),
        owner_id: UserId::new(row.try_get::<String, _>("owner_id")?),
        title: row.try_get("title")?,
        image_url: row.try_get("image_url")?,
        votes_count: count(row, "votes_count")?,
        wins_count: count(row, "wins_count")?,
        created_at: row.try_get("created_at")?,
    })
}

fn vote_from_row(row: &SqliteRow) -> anyhow::Result<Vote> {
    Ok(Vote {
        id: VoteId::new(row.try_get::<String, _>("id")?),
        group_id: GroupId::new(row.try_get::<String, _>("group_id")?),
        voter_id: UserId::new(row.try_get::<String, _>("voter_id")?),
        winner_photo_id: PhotoId::new(row.try_get::<String, _>("winner_photo_id")?),
        loser_photo_id: PhotoId::new(row.try_get::<String, _>("loser_photo_id")?),
        created_at: row.try_get("created_at")?,
    })
}

fn group_from_row(row: &SqliteRow) -> anyhow::Result<Group> {
    Ok(Group {
        id: GroupId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_public: row.try_get("is_public")?,
        created_by: UserId::new(row.try_get::<String, _>("created_by")?),
        created_at: row.try_get("created_at")?,
        photo_count: count(row, "photo_count")?,
    })
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl PhotoRepo for SqliteStore {
    /// Samples at random in SQL, so groups larger than `limit` still rotate
    /// every photo through the arena.
    async fn fetch_candidate_pool(&self, group_id: &GroupId, limit: usize) -> anyhow::Result<Vec<Photo>> {
        let rows = sqlx::query("SELECT * FROM photos WHERE group_id = ? ORDER BY RANDOM() LIMIT ?")
            .bind(group_id.as_str())
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await?;
        debug!(group_id = %group_id, fetched = rows.len(), "candidate pool query");

        rows.iter().map(photo_from_row).collect()
    }

    /// Atomic operation to append a vote and move both counters.
    ///
    /// # Developer Note
    /// Everything runs in one transaction (tx); any failure rolls back, so the
    /// counters never drift from the vote log.
    async fn record_vote(&self, vote: NewVote) -> anyhow::Result<Vote> {
        vote.validate()?;

        let mut tx = self.pool.begin().await?;

        // 1. Both photos must exist and belong to the vote's group
        for photo_id in [&vote.winner_photo_id, &vote.loser_photo_id] {
            let owner: Option<String> = sqlx::query_scalar("SELECT group_id FROM photos WHERE id = ?")
                .bind(photo_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
            match owner {
                None => bail!("photo {photo_id} not found"),
                Some(group) if group != vote.group_id.as_str() => {
                    bail!("photo {photo_id} does not belong to group {}", vote.group_id)
                }
                Some(_) => {}
            }
        }

        let recorded = Vote {
            id: VoteId::generate(),
            group_id: vote.group_id,
            voter_id: vote.voter_id,
            winner_photo_id: vote.winner_photo_id,
            loser_photo_id: vote.loser_photo_id,
            created_at: Utc::now(),
        };

        // 2. Append to the log
        sqlx::query("INSERT INTO votes (id, group_id, voter_id, winner_photo_id, loser_photo_id, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(recorded.id.as_str())
            .bind(recorded.group_id.as_str())
            .bind(recorded.voter_id.as_str())
            .bind(recorded.winner_photo_id.as_str())
            .bind(recorded.loser_photo_id.as_str())
            .bind(recorded.created_at)
            .execute(&mut *tx)
            .await?;

        // 3. Project onto the counters
        sqlx::query("UPDATE photos SET votes_count = votes_count + 1, wins_count = wins_count + 1 WHERE id = ?")
            .bind(recorded.winner_photo_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE photos SET votes_count = votes_count + 1 WHERE id = ?")
            .bind(recorded.loser_photo_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(recorded)
    }

    async fn leaderboard(&self, group_id: &GroupId, limit: usize) -> anyhow::Result<Vec<Photo>> {
        sqlx::query(
            "SELECT * FROM photos WHERE group_id = ?
             ORDER BY wins_count DESC, votes_count DESC, created_at ASC LIMIT ?",
        )
        .bind(group_id.as_str())
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(photo_from_row)
        .collect()
    }
}

const GROUP_SELECT: &str = "SELECT g.*, (SELECT COUNT(*) FROM photos p WHERE p.group_id = g.id) AS photo_count FROM groups g";

#[async_trait]
impl GroupRepo for SqliteStore {
    async fn list_groups(&self) -> anyhow::Result<Vec<Group>> {
        sqlx::query(&format!("{GROUP_SELECT} ORDER BY g.created_at DESC"))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(group_from_row)
            .collect()
    }

    async fn get_group(&self, id: &GroupId) -> anyhow::Result<Option<Group>> {
        sqlx::query(&format!("{GROUP_SELECT} WHERE g.id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(group_from_row)
            .transpose()
    }

    async fn create_group(&self, group: NewGroup) -> anyhow::Result<Group> {
        let group = group.normalized()?;
        let created = Group {
            id: GroupId::generate(),
            name: group.name,
            description: group.description,
            is_public: group.is_public,
            created_by: group.created_by,
            created_at: Utc::now(),
            photo_count: 0,
        };

        sqlx::query("INSERT INTO groups (id, name, description, is_public, created_by, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(created.id.as_str())
            .bind(&created.name)
            .bind(created.description.as_deref())
            .bind(created.is_public)
            .bind(created.created_by.as_str())
            .bind(created.created_at)
            .execute(&self.pool)
            .await?;
        Ok(created)
    }
}
