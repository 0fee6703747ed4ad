use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use compass_core::ids::{ReviewId, StepId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers::{self, date_str};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    InProgress,
    Completed,
    AutoArchived,
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::AutoArchived => write!(f, "auto_archived"),
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "auto_archived" => Ok(Self::AutoArchived),
            other => Err(format!("unknown review status: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewRow {
    pub id: ReviewId,
    pub user_id: UserId,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub completed_steps: Vec<StepId>,
    pub failed_steps: Vec<StepId>,
    pub reflection: Option<String>,
    pub ai_analysis: Option<serde_json::Value>,
    pub status: ReviewStatus,
    pub created_at: String,
}

pub struct ReviewRepo {
    db: Database,
}

impl ReviewRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new in_progress review.
    #[instrument(skip(self, completed_steps, failed_steps, reflection, ai_analysis),
                 fields(user_id = %user_id, week_start = %week_start))]
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &self,
        user_id: &UserId,
        week_start: NaiveDate,
        week_end: NaiveDate,
        completed_steps: &[StepId],
        failed_steps: &[StepId],
        reflection: Option<&str>,
        ai_analysis: Option<&serde_json::Value>,
    ) -> Result<ReviewRow, StoreError> {
        let id = ReviewId::new();
        let now = Utc::now().to_rfc3339();
        let completed_json = serde_json::to_string(completed_steps)?;
        let failed_json = serde_json::to_string(failed_steps)?;
        let analysis_json = ai_analysis.map(serde_json::to_string).transpose()?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO weekly_reviews
                    (id, user_id, week_start, week_end, completed_steps, failed_steps,
                     reflection, ai_analysis, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'in_progress', ?9)",
                rusqlite::params![
                    id.as_str(),
                    user_id.as_str(),
                    date_str(week_start),
                    date_str(week_end),
                    completed_json,
                    failed_json,
                    reflection,
                    analysis_json,
                    now,
                ],
            )?;

            Ok(ReviewRow {
                id,
                user_id: user_id.clone(),
                week_start,
                week_end,
                completed_steps: completed_steps.to_vec(),
                failed_steps: failed_steps.to_vec(),
                reflection: reflection.map(str::to_string),
                ai_analysis: ai_analysis.cloned(),
                status: ReviewStatus::InProgress,
                created_at: now,
            })
        })
    }

    /// Insert an empty in_progress review for a fresh week.
    pub fn insert_empty(
        &self,
        user_id: &UserId,
        week_start: NaiveDate,
        week_end: NaiveDate,
    ) -> Result<ReviewRow, StoreError> {
        self.insert(user_id, week_start, week_end, &[], &[], None, None)
    }

    /// The most recently created review for an owner.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn latest(&self, user_id: &UserId) -> Result<Option<ReviewRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, week_start, week_end, completed_steps, failed_steps,
                        reflection, ai_analysis, status, created_at
                 FROM weekly_reviews WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
            )?;
            let mut rows = stmt.query([user_id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_review(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Get a review by ID.
    #[instrument(skip(self), fields(review_id = %id))]
    pub fn get(&self, id: &ReviewId) -> Result<ReviewRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, week_start, week_end, completed_steps, failed_steps,
                        reflection, ai_analysis, status, created_at
                 FROM weekly_reviews WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_review(row),
                None => Err(StoreError::NotFound(format!("weekly review {id}"))),
            }
        })
    }

    /// Update review status (completed, auto_archived).
    #[instrument(skip(self), fields(review_id = %id, status = %status))]
    pub fn update_status(&self, id: &ReviewId, status: ReviewStatus) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE weekly_reviews SET status = ?1 WHERE id = ?2",
                rusqlite::params![status.to_string(), id.as_str()],
            )?;
            Ok(())
        })
    }
}

fn row_to_review(row: &rusqlite::Row<'_>) -> Result<ReviewRow, StoreError> {
    let completed_raw: String = row_helpers::get(row, 4, "weekly_reviews", "completed_steps")?;
    let failed_raw: String = row_helpers::get(row, 5, "weekly_reviews", "failed_steps")?;
    let analysis_raw: Option<String> = row_helpers::get_opt(row, 7, "weekly_reviews", "ai_analysis")?;
    let status_str: String = row_helpers::get(row, 8, "weekly_reviews", "status")?;

    let completed_steps: Vec<StepId> = serde_json::from_str(&completed_raw)
        .map_err(|e| StoreError::CorruptRow {
            table: "weekly_reviews",
            column: "completed_steps",
            detail: e.to_string(),
        })?;
    let failed_steps: Vec<StepId> = serde_json::from_str(&failed_raw)
        .map_err(|e| StoreError::CorruptRow {
            table: "weekly_reviews",
            column: "failed_steps",
            detail: e.to_string(),
        })?;
    let ai_analysis = analysis_raw
        .map(|raw| row_helpers::parse_json(&raw, "weekly_reviews", "ai_analysis"))
        .transpose()?;

    Ok(ReviewRow {
        id: ReviewId::from_raw(row_helpers::get::<String>(row, 0, "weekly_reviews", "id")?),
        user_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "weekly_reviews", "user_id")?),
        week_start: row_helpers::get_date(row, 2, "weekly_reviews", "week_start")?,
        week_end: row_helpers::get_date(row, 3, "weekly_reviews", "week_end")?,
        completed_steps,
        failed_steps,
        reflection: row_helpers::get_opt(row, 6, "weekly_reviews", "reflection")?,
        ai_analysis,
        status: row_helpers::parse_enum(&status_str, "weekly_reviews", "status")?,
        created_at: row_helpers::get(row, 9, "weekly_reviews", "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ReviewRepo, UserId) {
        let db = Database::in_memory().unwrap();
        (ReviewRepo::new(db), UserId::new())
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn insert_and_get() {
        let (repo, user) = setup();
        let done = vec![StepId::new()];
        let failed = vec![StepId::new(), StepId::new()];
        let analysis = serde_json::json!({"summary": "good week", "score": 8});

        let review = repo
            .insert(
                &user,
                d(2025, 6, 2),
                d(2025, 6, 8),
                &done,
                &failed,
                Some("felt focused"),
                Some(&analysis),
            )
            .unwrap();
        assert_eq!(review.status, ReviewStatus::InProgress);

        let fetched = repo.get(&review.id).unwrap();
        assert_eq!(fetched.completed_steps, done);
        assert_eq!(fetched.failed_steps, failed);
        assert_eq!(fetched.reflection.as_deref(), Some("felt focused"));
        assert_eq!(fetched.ai_analysis.unwrap()["score"], 8);
    }

    #[test]
    fn insert_empty_has_no_payload() {
        let (repo, user) = setup();
        let review = repo.insert_empty(&user, d(2025, 6, 2), d(2025, 6, 8)).unwrap();
        let fetched = repo.get(&review.id).unwrap();
        assert!(fetched.completed_steps.is_empty());
        assert!(fetched.failed_steps.is_empty());
        assert!(fetched.reflection.is_none());
        assert!(fetched.ai_analysis.is_none());
    }

    #[test]
    fn latest_returns_most_recent() {
        let (repo, user) = setup();
        assert!(repo.latest(&user).unwrap().is_none());

        repo.insert_empty(&user, d(2025, 5, 26), d(2025, 6, 1)).unwrap();
        let second = repo.insert_empty(&user, d(2025, 6, 2), d(2025, 6, 8)).unwrap();

        let latest = repo.latest(&user).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[test]
    fn latest_is_owner_scoped() {
        let (repo, user) = setup();
        let other = UserId::new();
        repo.insert_empty(&user, d(2025, 6, 2), d(2025, 6, 8)).unwrap();
        assert!(repo.latest(&other).unwrap().is_none());
    }

    #[test]
    fn update_status() {
        let (repo, user) = setup();
        let review = repo.insert_empty(&user, d(2025, 6, 2), d(2025, 6, 8)).unwrap();

        repo.update_status(&review.id, ReviewStatus::AutoArchived).unwrap();
        assert_eq!(repo.get(&review.id).unwrap().status, ReviewStatus::AutoArchived);
    }

    #[test]
    fn get_nonexistent_fails() {
        let (repo, _) = setup();
        let result = repo.get(&ReviewId::from_raw("review_nonexistent"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
