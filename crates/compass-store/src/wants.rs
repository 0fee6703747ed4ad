use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use compass_core::ids::{ChunkId, UserId, WantsId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

pub const DEFAULT_STREAM_TIMER_SECONDS: u32 = 600;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WantsStatus {
    Draft,
    Completed,
}

impl std::fmt::Display for WantsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for WantsStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown wants status: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkExercise {
    Stream,
    FutureSelf,
}

impl std::fmt::Display for ChunkExercise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::FutureSelf => write!(f, "future_self"),
        }
    }
}

impl std::str::FromStr for ChunkExercise {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stream" => Ok(Self::Stream),
            "future_self" => Ok(Self::FutureSelf),
            other => Err(format!("unknown chunk exercise: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WantsRow {
    pub id: WantsId,
    pub user_id: UserId,
    pub status: WantsStatus,
    pub stream_started_at: Option<String>,
    pub stream_timer_seconds: u32,
    pub stream_text: Option<String>,
    pub stream_completed_at: Option<String>,
    pub future_self_text: Option<String>,
    pub future_self_completed_at: Option<String>,
    pub envy: Option<String>,
    pub regrets: Option<String>,
    pub plan_5y: Option<String>,
    pub reverse_completed_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: ChunkId,
    pub wants_id: WantsId,
    pub exercise: ChunkExercise,
    pub text: String,
    pub created_at: String,
}

const SELECT_COLUMNS: &str = "id, user_id, status, stream_started_at, stream_timer_seconds,
        stream_text, stream_completed_at, future_self_text, future_self_completed_at,
        envy, regrets, plan_5y, reverse_completed_at, completed_at, created_at, updated_at";

pub struct WantsRepo {
    db: Database,
}

impl WantsRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a fresh empty draft. The partial unique index rejects a second
    /// draft for the same owner with a Conflict.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn insert_draft(&self, user_id: &UserId) -> Result<WantsRow, StoreError> {
        let id = WantsId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wants (id, user_id, status, stream_timer_seconds, created_at, updated_at)
                 VALUES (?1, ?2, 'draft', ?3, ?4, ?4)",
                rusqlite::params![
                    id.as_str(),
                    user_id.as_str(),
                    DEFAULT_STREAM_TIMER_SECONDS,
                    now,
                ],
            )?;

            Ok(WantsRow {
                id,
                user_id: user_id.clone(),
                status: WantsStatus::Draft,
                stream_started_at: None,
                stream_timer_seconds: DEFAULT_STREAM_TIMER_SECONDS,
                stream_text: None,
                stream_completed_at: None,
                future_self_text: None,
                future_self_completed_at: None,
                envy: None,
                regrets: None,
                plan_5y: None,
                reverse_completed_at: None,
                completed_at: None,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// The owner's current draft, if any (most recently updated first).
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn get_draft(&self, user_id: &UserId) -> Result<Option<WantsRow>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM wants
                 WHERE user_id = ?1 AND status = 'draft'
                 ORDER BY updated_at DESC LIMIT 1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([user_id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_wants(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Get a record by ID.
    #[instrument(skip(self), fields(wants_id = %id))]
    pub fn get(&self, id: &WantsId) -> Result<WantsRow, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM wants WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_wants(row),
                None => Err(StoreError::NotFound(format!("wants {id}"))),
            }
        })
    }

    /// A completed record scoped to its owner.
    #[instrument(skip(self), fields(user_id = %user_id, wants_id = %id))]
    pub fn get_completed(
        &self,
        user_id: &UserId,
        id: &WantsId,
    ) -> Result<Option<WantsRow>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM wants
                 WHERE id = ?1 AND user_id = ?2 AND status = 'completed'"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([id.as_str(), user_id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_wants(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Stamp the stream start time if not already stamped.
    #[instrument(skip(self), fields(wants_id = %id))]
    pub fn start_stream(&self, id: &WantsId) -> Result<(), StoreError> {
        self.touch_once(id, "stream_started_at")
    }

    /// Stamp stream completion if not already stamped.
    #[instrument(skip(self), fields(wants_id = %id))]
    pub fn complete_stream(&self, id: &WantsId) -> Result<(), StoreError> {
        self.touch_once(id, "stream_completed_at")
    }

    /// Stamp future-self completion if not already stamped.
    #[instrument(skip(self), fields(wants_id = %id))]
    pub fn complete_future_self(&self, id: &WantsId) -> Result<(), StoreError> {
        self.touch_once(id, "future_self_completed_at")
    }

    fn touch_once(&self, id: &WantsId, column: &'static str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                &format!(
                    "UPDATE wants SET {column} = COALESCE({column}, ?1), updated_at = ?1
                     WHERE id = ?2"
                ),
                rusqlite::params![now, id.as_str()],
            )?;
            Ok(())
        })
    }

    #[instrument(skip(self, text), fields(wants_id = %id))]
    pub fn set_stream_text(&self, id: &WantsId, text: &str) -> Result<(), StoreError> {
        self.set_text_column(id, "stream_text", text)
    }

    #[instrument(skip(self, text), fields(wants_id = %id))]
    pub fn set_future_self_text(&self, id: &WantsId, text: &str) -> Result<(), StoreError> {
        self.set_text_column(id, "future_self_text", text)
    }

    fn set_text_column(
        &self,
        id: &WantsId,
        column: &'static str,
        text: &str,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                &format!("UPDATE wants SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                rusqlite::params![text, now, id.as_str()],
            )?;
            Ok(())
        })
    }

    /// Overwrite the three reverse answers with their final values. When
    /// `stamp_completed` is set, the completion time is written once and
    /// never reset.
    #[instrument(skip(self, envy, regrets, plan_5y), fields(wants_id = %id, stamp_completed))]
    pub fn set_reverse(
        &self,
        id: &WantsId,
        envy: Option<&str>,
        regrets: Option<&str>,
        plan_5y: Option<&str>,
        stamp_completed: bool,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            if stamp_completed {
                conn.execute(
                    "UPDATE wants SET envy = ?1, regrets = ?2, plan_5y = ?3,
                        reverse_completed_at = COALESCE(reverse_completed_at, ?4),
                        updated_at = ?4
                     WHERE id = ?5",
                    rusqlite::params![envy, regrets, plan_5y, now, id.as_str()],
                )?;
            } else {
                conn.execute(
                    "UPDATE wants SET envy = ?1, regrets = ?2, plan_5y = ?3, updated_at = ?4
                     WHERE id = ?5",
                    rusqlite::params![envy, regrets, plan_5y, now, id.as_str()],
                )?;
            }
            Ok(())
        })
    }

    /// Transition draft → completed and stamp the overall completion time.
    #[instrument(skip(self), fields(wants_id = %id))]
    pub fn mark_completed(&self, id: &WantsId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE wants SET status = 'completed', completed_at = ?1, updated_at = ?1
                 WHERE id = ?2",
                rusqlite::params![now, id.as_str()],
            )?;
            Ok(())
        })
    }

    /// Append one fragment to the owned chunk log.
    #[instrument(skip(self, text), fields(wants_id = %wants_id, exercise = %exercise))]
    pub fn insert_chunk(
        &self,
        wants_id: &WantsId,
        exercise: ChunkExercise,
        text: &str,
    ) -> Result<ChunkRow, StoreError> {
        let id = ChunkId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wants_chunks (id, wants_id, exercise, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id.as_str(),
                    wants_id.as_str(),
                    exercise.to_string(),
                    text,
                    now,
                ],
            )?;

            Ok(ChunkRow {
                id,
                wants_id: wants_id.clone(),
                exercise,
                text: text.to_string(),
                created_at: now,
            })
        })
    }

    /// Chunks for a record, oldest first.
    #[instrument(skip(self), fields(wants_id = %wants_id))]
    pub fn list_chunks(&self, wants_id: &WantsId) -> Result<Vec<ChunkRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, wants_id, exercise, text, created_at FROM wants_chunks
                 WHERE wants_id = ?1 ORDER BY created_at ASC, id ASC",
            )?;
            let mut rows = stmt.query([wants_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_chunk(row)?);
            }
            Ok(results)
        })
    }

    /// Completed records, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn history_page(
        &self,
        user_id: &UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<WantsRow>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM wants
                 WHERE user_id = ?1 AND status = 'completed'
                 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(rusqlite::params![user_id.as_str(), limit, offset])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_wants(row)?);
            }
            Ok(results)
        })
    }

    /// Total completed records for pagination.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn history_count(&self, user_id: &UserId) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM wants WHERE user_id = ?1 AND status = 'completed'",
                [user_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

fn row_to_wants(row: &rusqlite::Row<'_>) -> Result<WantsRow, StoreError> {
    let status_str: String = row_helpers::get(row, 2, "wants", "status")?;

    Ok(WantsRow {
        id: WantsId::from_raw(row_helpers::get::<String>(row, 0, "wants", "id")?),
        user_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "wants", "user_id")?),
        status: row_helpers::parse_enum(&status_str, "wants", "status")?,
        stream_started_at: row_helpers::get_opt(row, 3, "wants", "stream_started_at")?,
        stream_timer_seconds: row_helpers::get::<i64>(row, 4, "wants", "stream_timer_seconds")? as u32,
        stream_text: row_helpers::get_opt(row, 5, "wants", "stream_text")?,
        stream_completed_at: row_helpers::get_opt(row, 6, "wants", "stream_completed_at")?,
        future_self_text: row_helpers::get_opt(row, 7, "wants", "future_self_text")?,
        future_self_completed_at: row_helpers::get_opt(row, 8, "wants", "future_self_completed_at")?,
        envy: row_helpers::get_opt(row, 9, "wants", "envy")?,
        regrets: row_helpers::get_opt(row, 10, "wants", "regrets")?,
        plan_5y: row_helpers::get_opt(row, 11, "wants", "plan_5y")?,
        reverse_completed_at: row_helpers::get_opt(row, 12, "wants", "reverse_completed_at")?,
        completed_at: row_helpers::get_opt(row, 13, "wants", "completed_at")?,
        created_at: row_helpers::get(row, 14, "wants", "created_at")?,
        updated_at: row_helpers::get(row, 15, "wants", "updated_at")?,
    })
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> Result<ChunkRow, StoreError> {
    let exercise_str: String = row_helpers::get(row, 2, "wants_chunks", "exercise")?;

    Ok(ChunkRow {
        id: ChunkId::from_raw(row_helpers::get::<String>(row, 0, "wants_chunks", "id")?),
        wants_id: WantsId::from_raw(row_helpers::get::<String>(row, 1, "wants_chunks", "wants_id")?),
        exercise: row_helpers::parse_enum(&exercise_str, "wants_chunks", "exercise")?,
        text: row_helpers::get(row, 3, "wants_chunks", "text")?,
        created_at: row_helpers::get(row, 4, "wants_chunks", "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (WantsRepo, UserId) {
        let db = Database::in_memory().unwrap();
        (WantsRepo::new(db), UserId::new())
    }

    #[test]
    fn insert_draft_defaults() {
        let (repo, user) = setup();
        let draft = repo.insert_draft(&user).unwrap();
        assert!(draft.id.as_str().starts_with("wants_"));
        assert_eq!(draft.status, WantsStatus::Draft);
        assert_eq!(draft.stream_timer_seconds, DEFAULT_STREAM_TIMER_SECONDS);
        assert!(draft.stream_started_at.is_none());
        assert!(draft.completed_at.is_none());
    }

    #[test]
    fn second_draft_conflicts() {
        let (repo, user) = setup();
        repo.insert_draft(&user).unwrap();
        let result = repo.insert_draft(&user);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn draft_per_owner_is_independent() {
        let (repo, user_a) = setup();
        let user_b = UserId::new();
        repo.insert_draft(&user_a).unwrap();
        repo.insert_draft(&user_b).unwrap();
        assert!(repo.get_draft(&user_a).unwrap().is_some());
        assert!(repo.get_draft(&user_b).unwrap().is_some());
    }

    #[test]
    fn get_draft_none_when_absent() {
        let (repo, user) = setup();
        assert!(repo.get_draft(&user).unwrap().is_none());
    }

    #[test]
    fn completed_record_allows_new_draft() {
        let (repo, user) = setup();
        let draft = repo.insert_draft(&user).unwrap();
        repo.mark_completed(&draft.id).unwrap();
        let next = repo.insert_draft(&user).unwrap();
        assert_ne!(draft.id, next.id);

        let fetched = repo.get(&draft.id).unwrap();
        assert_eq!(fetched.status, WantsStatus::Completed);
        assert!(fetched.completed_at.is_some());
    }

    #[test]
    fn stream_stamps_are_set_once() {
        let (repo, user) = setup();
        let draft = repo.insert_draft(&user).unwrap();

        repo.start_stream(&draft.id).unwrap();
        let first = repo.get(&draft.id).unwrap().stream_started_at.unwrap();
        repo.start_stream(&draft.id).unwrap();
        let second = repo.get(&draft.id).unwrap().stream_started_at.unwrap();
        assert_eq!(first, second);

        repo.complete_stream(&draft.id).unwrap();
        let first = repo.get(&draft.id).unwrap().stream_completed_at.unwrap();
        repo.complete_stream(&draft.id).unwrap();
        let second = repo.get(&draft.id).unwrap().stream_completed_at.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn set_reverse_stamps_once() {
        let (repo, user) = setup();
        let draft = repo.insert_draft(&user).unwrap();

        repo.set_reverse(&draft.id, Some("a"), Some("b"), Some("c"), true).unwrap();
        let first = repo.get(&draft.id).unwrap().reverse_completed_at.unwrap();

        repo.set_reverse(&draft.id, Some("x"), Some("b"), Some("c"), true).unwrap();
        let fetched = repo.get(&draft.id).unwrap();
        assert_eq!(fetched.envy.as_deref(), Some("x"));
        assert_eq!(fetched.reverse_completed_at.unwrap(), first);
    }

    #[test]
    fn chunks_append_in_order() {
        let (repo, user) = setup();
        let draft = repo.insert_draft(&user).unwrap();
        repo.insert_chunk(&draft.id, ChunkExercise::Stream, "travel more").unwrap();
        repo.insert_chunk(&draft.id, ChunkExercise::Stream, "learn piano").unwrap();
        repo.insert_chunk(&draft.id, ChunkExercise::FutureSelf, "calm mornings").unwrap();

        let chunks = repo.list_chunks(&draft.id).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "travel more");
        assert_eq!(chunks[1].text, "learn piano");
        assert_eq!(chunks[2].exercise, ChunkExercise::FutureSelf);
    }

    #[test]
    fn history_is_completed_only_newest_first() {
        let (repo, user) = setup();
        for _ in 0..3 {
            let draft = repo.insert_draft(&user).unwrap();
            repo.mark_completed(&draft.id).unwrap();
        }
        repo.insert_draft(&user).unwrap(); // live draft must not appear

        assert_eq!(repo.history_count(&user).unwrap(), 3);
        let page = repo.history_page(&user, 10, 0).unwrap();
        assert_eq!(page.len(), 3);
        assert!(page.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn history_pagination_bounds() {
        let (repo, user) = setup();
        for _ in 0..5 {
            let draft = repo.insert_draft(&user).unwrap();
            repo.mark_completed(&draft.id).unwrap();
        }
        assert_eq!(repo.history_page(&user, 2, 0).unwrap().len(), 2);
        assert_eq!(repo.history_page(&user, 2, 2).unwrap().len(), 2);
        assert_eq!(repo.history_page(&user, 2, 4).unwrap().len(), 1);
    }

    #[test]
    fn get_completed_scopes_to_owner() {
        let (repo, user) = setup();
        let stranger = UserId::new();
        let draft = repo.insert_draft(&user).unwrap();
        repo.mark_completed(&draft.id).unwrap();

        assert!(repo.get_completed(&user, &draft.id).unwrap().is_some());
        assert!(repo.get_completed(&stranger, &draft.id).unwrap().is_none());
    }
}
