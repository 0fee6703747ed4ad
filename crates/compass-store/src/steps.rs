use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use compass_core::ids::{StepId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers::{self, date_str};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepLevel {
    Year,
    Quarter,
    Month,
    Week,
    Day,
}

impl std::fmt::Display for StepLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Year => write!(f, "year"),
            Self::Quarter => write!(f, "quarter"),
            Self::Month => write!(f, "month"),
            Self::Week => write!(f, "week"),
            Self::Day => write!(f, "day"),
        }
    }
}

impl std::str::FromStr for StepLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "year" => Ok(Self::Year),
            "quarter" => Ok(Self::Quarter),
            "month" => Ok(Self::Month),
            "week" => Ok(Self::Week),
            "day" => Ok(Self::Day),
            other => Err(format!("unknown step level: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Planned,
    InProgress,
    Done,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planned => write!(f, "planned"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(Self::Planned),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown step status: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepRow {
    pub id: StepId,
    pub user_id: UserId,
    pub level: StepLevel,
    pub title: String,
    pub description: Option<String>,
    pub planned_date: Option<NaiveDate>,
    pub done_date: Option<NaiveDate>,
    pub status: StepStatus,
    pub created_at: String,
    pub updated_at: String,
}

const SELECT_COLUMNS: &str = "id, user_id, level, title, description, planned_date, done_date,
        status, created_at, updated_at";

/// Step records are owned by the goals subsystem; this repo touches only the
/// scheduling fields the ritual cycle reads and writes.
pub struct StepRepo {
    db: Database,
}

impl StepRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, title, description), fields(user_id = %user_id, level = %level))]
    pub fn insert(
        &self,
        user_id: &UserId,
        level: StepLevel,
        title: &str,
        description: Option<&str>,
        planned_date: Option<NaiveDate>,
        status: StepStatus,
    ) -> Result<StepRow, StoreError> {
        let id = StepId::new();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO steps (id, user_id, level, title, description, planned_date, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    id.as_str(),
                    user_id.as_str(),
                    level.to_string(),
                    title,
                    description,
                    planned_date.map(date_str),
                    status.to_string(),
                    now,
                ],
            )?;

            Ok(StepRow {
                id,
                user_id: user_id.clone(),
                level,
                title: title.to_string(),
                description: description.map(str::to_string),
                planned_date,
                done_date: None,
                status,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Steps planned inside a date range, inclusive.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn planned_in_range(
        &self,
        user_id: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StepRow>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM steps
                 WHERE user_id = ?1 AND planned_date IS NOT NULL
                   AND planned_date >= ?2 AND planned_date <= ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(rusqlite::params![
                user_id.as_str(),
                date_str(start),
                date_str(end)
            ])?;
            collect_steps(&mut rows)
        })
    }

    /// Unplanned quarter/month steps, oldest first, as next-week candidates.
    #[instrument(skip(self), fields(user_id = %user_id, limit))]
    pub fn unplanned_suggestions(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<StepRow>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM steps
                 WHERE user_id = ?1 AND status = 'planned' AND planned_date IS NULL
                   AND level IN ('quarter', 'month')
                 ORDER BY created_at ASC, id ASC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(rusqlite::params![user_id.as_str(), limit])?;
            collect_steps(&mut rows)
        })
    }

    /// Clear the schedule of every not-done step planned inside the range:
    /// planned_date is removed and status reset to planned. Returns the
    /// number of affected steps.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn unschedule_open_in_range(
        &self,
        user_id: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let affected = conn.execute(
                "UPDATE steps SET planned_date = NULL, status = 'planned', updated_at = ?1
                 WHERE user_id = ?2 AND planned_date IS NOT NULL
                   AND planned_date >= ?3 AND planned_date <= ?4 AND status != 'done'",
                rusqlite::params![now, user_id.as_str(), date_str(start), date_str(end)],
            )?;
            Ok(affected)
        })
    }

    /// Fetch owned steps by ID; ids not owned by the user are skipped.
    #[instrument(skip(self, ids), fields(user_id = %user_id, count = ids.len()))]
    pub fn get_many(&self, user_id: &UserId, ids: &[StepId]) -> Result<Vec<StepRow>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.db.with_conn(|conn| {
            let placeholders = (2..ids.len() + 2)
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM steps
                 WHERE user_id = ?1 AND id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql)?;
            let uid = user_id.as_str();
            let id_strs: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(ids.len() + 1);
            params.push(&uid);
            for id in &id_strs {
                params.push(id);
            }
            let mut rows = stmt.query(params.as_slice())?;
            collect_steps(&mut rows)
        })
    }

    /// Write the scheduling fields of one step.
    #[instrument(skip(self), fields(step_id = %id, status = %status))]
    pub fn set_schedule(
        &self,
        id: &StepId,
        planned_date: Option<NaiveDate>,
        status: StepStatus,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE steps SET planned_date = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![
                    planned_date.map(date_str),
                    status.to_string(),
                    now,
                    id.as_str()
                ],
            )?;
            Ok(())
        })
    }
}

fn collect_steps(rows: &mut rusqlite::Rows<'_>) -> Result<Vec<StepRow>, StoreError> {
    let mut results = Vec::new();
    while let Some(row) = rows.next().map_err(StoreError::from)? {
        results.push(row_to_step(row)?);
    }
    Ok(results)
}

fn row_to_step(row: &rusqlite::Row<'_>) -> Result<StepRow, StoreError> {
    let level_str: String = row_helpers::get(row, 2, "steps", "level")?;
    let status_str: String = row_helpers::get(row, 7, "steps", "status")?;

    Ok(StepRow {
        id: StepId::from_raw(row_helpers::get::<String>(row, 0, "steps", "id")?),
        user_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "steps", "user_id")?),
        level: row_helpers::parse_enum(&level_str, "steps", "level")?,
        title: row_helpers::get(row, 3, "steps", "title")?,
        description: row_helpers::get_opt(row, 4, "steps", "description")?,
        planned_date: row_helpers::get_opt_date(row, 5, "steps", "planned_date")?,
        done_date: row_helpers::get_opt_date(row, 6, "steps", "done_date")?,
        status: row_helpers::parse_enum(&status_str, "steps", "status")?,
        created_at: row_helpers::get(row, 8, "steps", "created_at")?,
        updated_at: row_helpers::get(row, 9, "steps", "updated_at")?,
    })
}
