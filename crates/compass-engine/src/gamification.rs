use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use compass_core::ids::UserId;
use compass_store::profiles::ProfileRepo;
use compass_store::Database;

use crate::cache::ProfileCache;
use crate::error::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    MorningRitual,
    EveningRitual,
    WeeklyReviewComplete,
}

impl ActionType {
    pub fn xp(self) -> i64 {
        match self {
            Self::MorningRitual => 15,
            Self::EveningRitual => 15,
            Self::WeeklyReviewComplete => 50,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::MorningRitual => "Morning ritual",
            Self::EveningRitual => "Evening ritual",
            Self::WeeklyReviewComplete => "Weekly review",
        }
    }
}

/// Level ladder: (level, min_xp, max_xp, title). The last level is open-ended.
const LEVELS: [(i32, i64, Option<i64>, &str); 5] = [
    (1, 0, Some(150), "Novice"),
    (2, 151, Some(450), "Seeker"),
    (3, 451, Some(1000), "Strategist"),
    (4, 1001, Some(2000), "Architect"),
    (5, 2001, None, "Demiurge"),
];

fn level_by_xp(total_xp: i64) -> i32 {
    for (level, min_xp, max_xp, _) in LEVELS {
        if total_xp < min_xp {
            continue;
        }
        if max_xp.map_or(true, |max| total_xp <= max) {
            return level;
        }
    }
    LEVELS[LEVELS.len() - 1].0
}

fn level_title(level: i32) -> &'static str {
    LEVELS
        .iter()
        .find(|(lvl, ..)| *lvl == level)
        .map(|(_, _, _, title)| *title)
        .unwrap_or(LEVELS[0].3)
}

fn level_bounds(level: i32) -> (i64, Option<i64>) {
    LEVELS
        .iter()
        .find(|(lvl, ..)| *lvl == level)
        .map(|(_, min, max, _)| (*min, *max))
        .unwrap_or((LEVELS[0].1, LEVELS[0].2))
}

fn xp_to_next_level(total_xp: i64) -> i64 {
    let (_, max_xp) = level_bounds(level_by_xp(total_xp));
    max_xp.map_or(0, |max| max - total_xp)
}

fn progress_percent(total_xp: i64) -> i32 {
    let (min_xp, max_xp) = level_bounds(level_by_xp(total_xp));
    let Some(max_xp) = max_xp else { return 100 };
    if max_xp == min_xp {
        return 100;
    }
    let raw = (total_xp - min_xp) as f64 / (max_xp - min_xp) as f64 * 100.0;
    (raw.round() as i32).clamp(0, 100)
}

#[derive(Clone, Debug, Serialize)]
pub struct AwardResult {
    pub xp_gained: i64,
    pub total_xp: i64,
    pub level_up: bool,
    pub new_level: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    XpAdded,
    LevelUp,
}

#[derive(Clone, Debug, Serialize)]
pub struct LevelInfo {
    pub current: i32,
    pub title: &'static str,
    pub progress_percent: i32,
}

/// Event payload returned alongside the mutation that earned it.
#[derive(Clone, Debug, Serialize)]
pub struct GamificationEvent {
    pub status: EventStatus,
    pub xp_gained: i64,
    pub total_xp: i64,
    pub level: LevelInfo,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfilePayload {
    pub level: i32,
    pub level_title: String,
    pub xp: i64,
    pub xp_to_next_level: i64,
    pub streak: i32,
    pub longest_streak: i32,
}

/// Awards XP and maintains streak/level counters as a side effect of ritual
/// and review mutations.
pub struct GamificationService {
    profiles: ProfileRepo,
    cache: Arc<dyn ProfileCache>,
}

impl GamificationService {
    pub fn new(db: Database, cache: Arc<dyn ProfileCache>) -> Self {
        Self {
            profiles: ProfileRepo::new(db),
            cache,
        }
    }

    /// Apply one action's XP and streak effect. `today` is injected so the
    /// streak logic stays deterministic under test.
    #[instrument(skip(self), fields(user_id = %user_id, action = ?action, date = %today))]
    pub fn award(
        &self,
        user_id: &UserId,
        action: ActionType,
        today: NaiveDate,
    ) -> Result<AwardResult, EngineError> {
        let mut profile = self.profiles.get_or_create(user_id)?;

        let xp_gained = action.xp();
        profile.total_xp += xp_gained;

        let yesterday = today - Duration::days(1);
        let streak_changed = match profile.last_activity_date {
            None => {
                profile.current_streak = 1;
                true
            }
            Some(last) if last == today => false,
            Some(last) if last == yesterday => {
                profile.current_streak += 1;
                true
            }
            Some(_) => {
                profile.current_streak = 1;
                true
            }
        };
        if streak_changed {
            profile.longest_streak = profile.longest_streak.max(profile.current_streak);
        }
        profile.last_activity_date = Some(today);

        let new_level = level_by_xp(profile.total_xp);
        let level_up = new_level > profile.current_level;
        if level_up {
            profile.current_level = new_level;
        }

        self.profiles.update(&profile)?;
        self.cache.invalidate(user_id);

        Ok(AwardResult {
            xp_gained,
            total_xp: profile.total_xp,
            level_up,
            new_level: profile.current_level,
        })
    }

    pub fn build_event(&self, action: ActionType, award: &AwardResult) -> GamificationEvent {
        let status = if award.level_up {
            EventStatus::LevelUp
        } else {
            EventStatus::XpAdded
        };
        let title = level_title(award.new_level);
        let message = match status {
            EventStatus::LevelUp => format!("NEW LEVEL: {title}!"),
            EventStatus::XpAdded => format!("+{} XP {}", award.xp_gained, action.label()),
        };

        GamificationEvent {
            status,
            xp_gained: award.xp_gained,
            total_xp: award.total_xp,
            level: LevelInfo {
                current: award.new_level,
                title,
                progress_percent: progress_percent(award.total_xp),
            },
            message,
        }
    }

    /// The profile summary for display, read through the cache.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn profile_payload(&self, user_id: &UserId) -> Result<ProfilePayload, EngineError> {
        if let Some(cached) = self.cache.get(user_id) {
            return Ok(cached);
        }

        let profile = self.profiles.get_or_create(user_id)?;
        let payload = ProfilePayload {
            level: profile.current_level,
            level_title: level_title(profile.current_level).to_string(),
            xp: profile.total_xp,
            xp_to_next_level: xp_to_next_level(profile.total_xp),
            streak: profile.current_streak,
            longest_streak: profile.longest_streak,
        };
        self.cache.put(user_id, payload.clone());
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, NoopCache};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup() -> (GamificationService, UserId) {
        let db = Database::in_memory().unwrap();
        (GamificationService::new(db, Arc::new(NoopCache)), UserId::new())
    }

    #[test]
    fn level_ladder_boundaries() {
        assert_eq!(level_by_xp(0), 1);
        assert_eq!(level_by_xp(150), 1);
        assert_eq!(level_by_xp(151), 2);
        assert_eq!(level_by_xp(450), 2);
        assert_eq!(level_by_xp(1000), 3);
        assert_eq!(level_by_xp(2001), 5);
        assert_eq!(level_by_xp(1_000_000), 5);
    }

    #[test]
    fn xp_to_next_is_zero_at_top_level() {
        assert_eq!(xp_to_next_level(2001), 0);
        assert_eq!(xp_to_next_level(100), 50);
    }

    #[test]
    fn progress_percent_clamps() {
        assert_eq!(progress_percent(0), 0);
        assert_eq!(progress_percent(75), 50);
        assert_eq!(progress_percent(5000), 100);
    }

    #[test]
    fn award_action_xp_values() {
        let (service, user) = setup();
        let today = d(2025, 6, 2);

        let result = service.award(&user, ActionType::MorningRitual, today).unwrap();
        assert_eq!(result.xp_gained, 15);
        assert_eq!(result.total_xp, 15);

        let result = service.award(&user, ActionType::EveningRitual, today).unwrap();
        assert_eq!(result.total_xp, 30);

        let result = service.award(&user, ActionType::WeeklyReviewComplete, today).unwrap();
        assert_eq!(result.xp_gained, 50);
        assert_eq!(result.total_xp, 80);
        assert!(!result.level_up);
    }

    #[test]
    fn level_up_at_ladder_boundary() {
        let (service, user) = setup();
        let today = d(2025, 6, 2);

        // 10 weekly reviews → 500 XP → level 3 territory crossed at 451
        let mut last = None;
        for _ in 0..10 {
            last = Some(service.award(&user, ActionType::WeeklyReviewComplete, today).unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.total_xp, 500);
        assert_eq!(last.new_level, 3);

        let event = service.build_event(ActionType::WeeklyReviewComplete, &last);
        assert_eq!(event.status, EventStatus::LevelUp);
        assert_eq!(event.message, "NEW LEVEL: Strategist!");
    }

    #[test]
    fn xp_added_event_message() {
        let (service, user) = setup();
        let result = service.award(&user, ActionType::MorningRitual, d(2025, 6, 2)).unwrap();
        let event = service.build_event(ActionType::MorningRitual, &result);
        assert_eq!(event.status, EventStatus::XpAdded);
        assert_eq!(event.message, "+15 XP Morning ritual");
        assert_eq!(event.level.current, 1);
    }

    #[test]
    fn streak_increments_on_consecutive_days() {
        let (service, user) = setup();
        service.award(&user, ActionType::MorningRitual, d(2025, 6, 2)).unwrap();
        service.award(&user, ActionType::MorningRitual, d(2025, 6, 3)).unwrap();
        service.award(&user, ActionType::MorningRitual, d(2025, 6, 4)).unwrap();

        let payload = service.profile_payload(&user).unwrap();
        assert_eq!(payload.streak, 3);
        assert_eq!(payload.longest_streak, 3);
    }

    #[test]
    fn streak_same_day_is_idempotent() {
        let (service, user) = setup();
        service.award(&user, ActionType::MorningRitual, d(2025, 6, 2)).unwrap();
        service.award(&user, ActionType::EveningRitual, d(2025, 6, 2)).unwrap();

        let payload = service.profile_payload(&user).unwrap();
        assert_eq!(payload.streak, 1);
        assert_eq!(payload.xp, 30);
    }

    #[test]
    fn streak_resets_after_gap() {
        let (service, user) = setup();
        service.award(&user, ActionType::MorningRitual, d(2025, 6, 2)).unwrap();
        service.award(&user, ActionType::MorningRitual, d(2025, 6, 3)).unwrap();
        service.award(&user, ActionType::MorningRitual, d(2025, 6, 7)).unwrap();

        let payload = service.profile_payload(&user).unwrap();
        assert_eq!(payload.streak, 1);
        assert_eq!(payload.longest_streak, 2);
    }

    #[test]
    fn award_invalidates_cached_profile() {
        let db = Database::in_memory().unwrap();
        let cache = Arc::new(MemoryCache::new());
        let service = GamificationService::new(db, cache.clone());
        let user = UserId::new();

        let before = service.profile_payload(&user).unwrap();
        assert_eq!(before.xp, 0);
        assert!(cache.get(&user).is_some());

        service.award(&user, ActionType::MorningRitual, d(2025, 6, 2)).unwrap();
        assert!(cache.get(&user).is_none());

        let after = service.profile_payload(&user).unwrap();
        assert_eq!(after.xp, 15);
    }
}
