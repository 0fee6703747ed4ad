use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use compass_core::ids::{EntryId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers::{self, date_str};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalSlot {
    Morning,
    Evening,
}

impl std::fmt::Display for JournalSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Morning => write!(f, "morning"),
            Self::Evening => write!(f, "evening"),
        }
    }
}

impl std::str::FromStr for JournalSlot {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(Self::Morning),
            "evening" => Ok(Self::Evening),
            other => Err(format!("unknown journal slot: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalRow {
    pub id: EntryId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub slot: JournalSlot,
    pub answers: serde_json::Value,
    pub mood_score: Option<i32>,
    pub energy_score: Option<i32>,
    pub created_at: String,
}

pub struct JournalRepo {
    db: Database,
}

impl JournalRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert one check-in. The UNIQUE(user_id, date, slot) constraint turns
    /// a concurrent duplicate into a Conflict for the losing writer.
    #[instrument(skip(self, answers), fields(user_id = %user_id, date = %date, slot = %slot))]
    pub fn insert(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        slot: JournalSlot,
        answers: &serde_json::Value,
        mood_score: Option<i32>,
        energy_score: Option<i32>,
    ) -> Result<JournalRow, StoreError> {
        let id = EntryId::new();
        let now = Utc::now().to_rfc3339();
        let answers_json = serde_json::to_string(answers)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO journal_entries (id, user_id, date, slot, answers, mood_score, energy_score, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id.as_str(),
                    user_id.as_str(),
                    date_str(date),
                    slot.to_string(),
                    answers_json,
                    mood_score,
                    energy_score,
                    now,
                ],
            )?;

            Ok(JournalRow {
                id,
                user_id: user_id.clone(),
                date,
                slot,
                answers: answers.clone(),
                mood_score,
                energy_score,
                created_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id, date = %date, slot = %slot))]
    pub fn exists(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        slot: JournalSlot,
    ) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM journal_entries
                 WHERE user_id = ?1 AND date = ?2 AND slot = ?3",
                rusqlite::params![user_id.as_str(), date_str(date), slot.to_string()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// All entries for one calendar date.
    #[instrument(skip(self), fields(user_id = %user_id, date = %date))]
    pub fn for_date(&self, user_id: &UserId, date: NaiveDate) -> Result<Vec<JournalRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, date, slot, answers, mood_score, energy_score, created_at
                 FROM journal_entries WHERE user_id = ?1 AND date = ?2",
            )?;
            let mut rows = stmt.query(rusqlite::params![user_id.as_str(), date_str(date)])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_entry(row)?);
            }
            Ok(results)
        })
    }

    /// Non-null mood scores across a date range, inclusive.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn mood_scores_in_range(
        &self,
        user_id: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<i32>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT mood_score FROM journal_entries
                 WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 AND mood_score IS NOT NULL",
            )?;
            let mut rows = stmt.query(rusqlite::params![
                user_id.as_str(),
                date_str(start),
                date_str(end)
            ])?;
            let mut scores = Vec::new();
            while let Some(row) = rows.next()? {
                scores.push(row_helpers::get(row, 0, "journal_entries", "mood_score")?);
            }
            Ok(scores)
        })
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<JournalRow, StoreError> {
    let slot_str: String = row_helpers::get(row, 3, "journal_entries", "slot")?;
    let answers_raw: String = row_helpers::get(row, 4, "journal_entries", "answers")?;

    Ok(JournalRow {
        id: EntryId::from_raw(row_helpers::get::<String>(row, 0, "journal_entries", "id")?),
        user_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "journal_entries", "user_id")?),
        date: row_helpers::get_date(row, 2, "journal_entries", "date")?,
        slot: row_helpers::parse_enum(&slot_str, "journal_entries", "slot")?,
        answers: row_helpers::parse_json(&answers_raw, "journal_entries", "answers")?,
        mood_score: row_helpers::get_opt(row, 5, "journal_entries", "mood_score")?,
        energy_score: row_helpers::get_opt(row, 6, "journal_entries", "energy_score")?,
        created_at: row_helpers::get(row, 7, "journal_entries", "created_at")?,
    })
}
