use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use compass_core::ids::UserId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers::{self, date_str};

/// Gamification counters, one row per user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileRow {
    pub user_id: UserId,
    pub total_xp: i64,
    pub current_level: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ProfileRepo {
    db: Database,
}

impl ProfileRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a profile, creating the zeroed row on first touch.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn get_or_create(&self, user_id: &UserId) -> Result<ProfileRow, StoreError> {
        self.db.with_conn(|conn| {
            let existing = query_profile(conn, user_id)?;
            if let Some(profile) = existing {
                return Ok(profile);
            }

            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO profiles (user_id, total_xp, current_level, current_streak,
                                       longest_streak, created_at, updated_at)
                 VALUES (?1, 0, 1, 0, 0, ?2, ?2)",
                rusqlite::params![user_id.as_str(), now],
            )?;

            Ok(ProfileRow {
                user_id: user_id.clone(),
                total_xp: 0,
                current_level: 1,
                current_streak: 0,
                longest_streak: 0,
                last_activity_date: None,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Write back the mutable counters.
    #[instrument(skip(self, profile), fields(user_id = %profile.user_id))]
    pub fn update(&self, profile: &ProfileRow) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE profiles SET total_xp = ?1, current_level = ?2, current_streak = ?3,
                        longest_streak = ?4, last_activity_date = ?5, updated_at = ?6
                 WHERE user_id = ?7",
                rusqlite::params![
                    profile.total_xp,
                    profile.current_level,
                    profile.current_streak,
                    profile.longest_streak,
                    profile.last_activity_date.map(date_str),
                    now,
                    profile.user_id.as_str(),
                ],
            )?;
            Ok(())
        })
    }
}

fn query_profile(
    conn: &rusqlite::Connection,
    user_id: &UserId,
) -> Result<Option<ProfileRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT user_id, total_xp, current_level, current_streak, longest_streak,
                last_activity_date, created_at, updated_at
         FROM profiles WHERE user_id = ?1",
    )?;
    let mut rows = stmt.query([user_id.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_profile(row)?)),
        None => Ok(None),
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> Result<ProfileRow, StoreError> {
    Ok(ProfileRow {
        user_id: UserId::from_raw(row_helpers::get::<String>(row, 0, "profiles", "user_id")?),
        total_xp: row_helpers::get(row, 1, "profiles", "total_xp")?,
        current_level: row_helpers::get(row, 2, "profiles", "current_level")?,
        current_streak: row_helpers::get(row, 3, "profiles", "current_streak")?,
        longest_streak: row_helpers::get(row, 4, "profiles", "longest_streak")?,
        last_activity_date: row_helpers::get_opt_date(row, 5, "profiles", "last_activity_date")?,
        created_at: row_helpers::get(row, 6, "profiles", "created_at")?,
        updated_at: row_helpers::get(row, 7, "profiles", "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ProfileRepo, UserId) {
        let db = Database::in_memory().unwrap();
        (ProfileRepo::new(db), UserId::new())
    }

    #[test]
    fn get_or_create_starts_zeroed() {
        let (repo, user) = setup();
        let profile = repo.get_or_create(&user).unwrap();
        assert_eq!(profile.total_xp, 0);
        assert_eq!(profile.current_level, 1);
        assert_eq!(profile.current_streak, 0);
        assert!(profile.last_activity_date.is_none());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let (repo, user) = setup();
        let first = repo.get_or_create(&user).unwrap();
        let second = repo.get_or_create(&user).unwrap();
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn update_roundtrip() {
        let (repo, user) = setup();
        let mut profile = repo.get_or_create(&user).unwrap();
        profile.total_xp = 180;
        profile.current_level = 2;
        profile.current_streak = 4;
        profile.longest_streak = 9;
        profile.last_activity_date = NaiveDate::from_ymd_opt(2025, 6, 5);

        repo.update(&profile).unwrap();
        let fetched = repo.get_or_create(&user).unwrap();
        assert_eq!(fetched.total_xp, 180);
        assert_eq!(fetched.current_level, 2);
        assert_eq!(fetched.current_streak, 4);
        assert_eq!(fetched.longest_streak, 9);
        assert_eq!(fetched.last_activity_date, NaiveDate::from_ymd_opt(2025, 6, 5));
    }
}
