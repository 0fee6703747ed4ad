use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};

use compass_core::analysis::{AnalysisProvider, AnalysisRequest, StepSummary, WeekPayload};
use compass_core::errors::GenerationError;
use compass_core::ids::{ReviewId, StepId, UserId};
use compass_core::week::week_bounds;
use compass_store::error::StoreError;
use compass_store::journal::{JournalRepo, JournalRow, JournalSlot};
use compass_store::reviews::{ReviewRepo, ReviewRow, ReviewStatus};
use compass_store::steps::{StepRepo, StepRow, StepStatus};
use compass_store::Database;

use crate::error::EngineError;

/// Days past week_end during which an overdue review is forced rather than
/// auto-archived.
const GRACE_DAYS: i64 = 3;

#[derive(Clone, Debug, Serialize)]
pub struct TodayStatus {
    pub date: NaiveDate,
    pub morning_done: bool,
    pub evening_done: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptionKind {
    ForceReview,
    FreshStart,
}

/// Signal that the weekly cycle requires user action before normal flow
/// resumes. `review_id` is present only for a forced review; a fresh start
/// has already closed the stale review.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Interception {
    #[serde(rename = "type")]
    pub kind: InterceptionKind,
    pub review_id: Option<ReviewId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RitualsToday {
    #[serde(flatten)]
    pub status: TodayStatus,
    pub interception: Option<Interception>,
}

/// Tracks daily check-ins and mediates catch-up behavior when a week is left
/// unclosed. The interception state machine is evaluated lazily on read
/// against an injected `today`; there is no background sweep.
pub struct RitualService {
    journal: JournalRepo,
    reviews: ReviewRepo,
    steps: StepRepo,
    provider: Arc<dyn AnalysisProvider>,
    generation_timeout: Duration,
}

impl RitualService {
    pub fn new(
        db: Database,
        provider: Arc<dyn AnalysisProvider>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            journal: JournalRepo::new(db.clone()),
            reviews: ReviewRepo::new(db.clone()),
            steps: StepRepo::new(db),
            provider,
            generation_timeout,
        }
    }

    /// Which slots are done for `today`. Pure read.
    #[instrument(skip(self), fields(user_id = %user_id, date = %today))]
    pub fn today_status(&self, user_id: &UserId, today: NaiveDate) -> Result<TodayStatus, EngineError> {
        let entries = self.journal.for_date(user_id, today)?;
        Ok(TodayStatus {
            date: today,
            morning_done: entries.iter().any(|e| e.slot == JournalSlot::Morning),
            evening_done: entries.iter().any(|e| e.slot == JournalSlot::Evening),
        })
    }

    /// Today's status plus the interception evaluation, which may
    /// auto-archive a stale review and open the current week as a side
    /// effect of this read.
    #[instrument(skip(self), fields(user_id = %user_id, date = %today))]
    pub fn today_status_with_interception(
        &self,
        user_id: &UserId,
        today: NaiveDate,
    ) -> Result<RitualsToday, EngineError> {
        let status = self.today_status(user_id, today)?;

        let Some(latest) = self.reviews.latest(user_id)? else {
            return Ok(RitualsToday { status, interception: None });
        };

        match latest.status {
            ReviewStatus::Completed | ReviewStatus::AutoArchived => {
                // Housekeeping: roll the cycle forward past a closed week.
                let (current_start, current_end) = week_bounds(today);
                if latest.week_start < current_start {
                    self.reviews.insert_empty(user_id, current_start, current_end)?;
                }
                Ok(RitualsToday { status, interception: None })
            }
            ReviewStatus::InProgress => {
                let days_late = (today - latest.week_end).num_days();
                if days_late <= 0 {
                    return Ok(RitualsToday { status, interception: None });
                }

                if days_late <= GRACE_DAYS {
                    return Ok(RitualsToday {
                        status,
                        interception: Some(Interception {
                            kind: InterceptionKind::ForceReview,
                            review_id: Some(latest.id),
                        }),
                    });
                }

                self.auto_archive(&latest)?;
                let (current_start, current_end) = week_bounds(today);
                self.reviews.insert_empty(user_id, current_start, current_end)?;
                Ok(RitualsToday {
                    status,
                    interception: Some(Interception {
                        kind: InterceptionKind::FreshStart,
                        review_id: None,
                    }),
                })
            }
        }
    }

    /// Close a stale review: unschedule its open steps (kept, not lost) and
    /// mark the review auto_archived.
    fn auto_archive(&self, review: &ReviewRow) -> Result<(), EngineError> {
        let cleared = self
            .steps
            .unschedule_open_in_range(&review.user_id, review.week_start, review.week_end)?;
        self.reviews.update_status(&review.id, ReviewStatus::AutoArchived)?;
        info!(review_id = %review.id, cleared, "weekly review auto-archived");
        Ok(())
    }

    /// The sole write path for daily rituals; entries are never updated or
    /// deleted.
    #[instrument(skip(self, answers), fields(user_id = %user_id, date = %today, slot = %slot))]
    pub fn create_journal_entry(
        &self,
        user_id: &UserId,
        today: NaiveDate,
        slot: JournalSlot,
        answers: &serde_json::Value,
        mood_score: Option<i32>,
        energy_score: Option<i32>,
    ) -> Result<JournalRow, EngineError> {
        if self.journal.exists(user_id, today, slot)? {
            return Err(EngineError::AlreadyCompleted);
        }
        match self.journal.insert(user_id, today, slot, answers, mood_score, energy_score) {
            Ok(entry) => Ok(entry),
            // Concurrent duplicate lost the unique-constraint race.
            Err(StoreError::Conflict(_)) => Err(EngineError::AlreadyCompleted),
            Err(e) => Err(e.into()),
        }
    }

    /// Steps planned inside the week, partitioned into done vs not-done.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn weekly_steps(
        &self,
        user_id: &UserId,
        week_start: NaiveDate,
        week_end: NaiveDate,
    ) -> Result<(Vec<StepRow>, Vec<StepRow>), EngineError> {
        let steps = self.steps.planned_in_range(user_id, week_start, week_end)?;
        let (completed, failed) = steps
            .into_iter()
            .partition(|s| s.status == StepStatus::Done);
        Ok((completed, failed))
    }

    /// Average of non-null mood scores in the week, rounded to 2 decimal
    /// places. None when nothing was scored — never a default zero.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn week_mood_avg(
        &self,
        user_id: &UserId,
        week_start: NaiveDate,
        week_end: NaiveDate,
    ) -> Result<Option<f64>, EngineError> {
        let scores = self.journal.mood_scores_in_range(user_id, week_start, week_end)?;
        if scores.is_empty() {
            return Ok(None);
        }
        let avg = scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64;
        Ok(Some((avg * 100.0).round() / 100.0))
    }

    /// Persist a review carrying a submitted reflection and AI analysis.
    #[instrument(skip(self, completed_ids, failed_ids, reflection, ai_analysis),
                 fields(user_id = %user_id, week_start = %week_start))]
    #[allow(clippy::too_many_arguments)]
    pub fn create_weekly_review(
        &self,
        user_id: &UserId,
        week_start: NaiveDate,
        week_end: NaiveDate,
        completed_ids: &[StepId],
        failed_ids: &[StepId],
        reflection: &str,
        ai_analysis: &serde_json::Value,
    ) -> Result<ReviewRow, EngineError> {
        Ok(self.reviews.insert(
            user_id,
            week_start,
            week_end,
            completed_ids,
            failed_ids,
            Some(reflection),
            Some(ai_analysis),
        )?)
    }

    /// Unplanned quarter/month steps as candidates for next week.
    #[instrument(skip(self), fields(user_id = %user_id, limit))]
    pub fn plan_suggestion(&self, user_id: &UserId, limit: u32) -> Result<Vec<StepRow>, EngineError> {
        Ok(self.steps.unplanned_suggestions(user_id, limit)?)
    }

    /// Schedule the named steps into the week ending at week_start + 6 days.
    /// Steps that already carry a planned_date keep it; status is always
    /// reset to planned.
    #[instrument(skip(self, step_ids), fields(user_id = %user_id, week_start = %week_start))]
    pub fn commit_week_plan(
        &self,
        user_id: &UserId,
        step_ids: &[StepId],
        week_start: NaiveDate,
    ) -> Result<Vec<StepRow>, EngineError> {
        let week_end = week_start + chrono::Duration::days(6);
        let steps = self.steps.get_many(user_id, step_ids)?;
        if steps.is_empty() {
            return Err(EngineError::NotFound("steps".to_string()));
        }

        for step in &steps {
            let planned = step.planned_date.unwrap_or(week_end);
            self.steps.set_schedule(&step.id, Some(planned), StepStatus::Planned)?;
        }

        let ids: Vec<StepId> = steps.iter().map(|s| s.id.clone()).collect();
        Ok(self.steps.get_many(user_id, &ids)?)
    }

    /// Gather last week's outcome, obtain the AI analysis under a bounded
    /// wait, and persist the review. A timeout is an unknown outcome: the
    /// runner may still finish, and a re-run only adds a new history row.
    #[instrument(skip(self, reflection, user_name), fields(user_id = %user_id, date = %today))]
    pub async fn analyze_week(
        &self,
        user_id: &UserId,
        today: NaiveDate,
        reflection: &str,
        user_name: Option<&str>,
    ) -> Result<ReviewRow, EngineError> {
        // Yesterday anchors the week under review, so a Monday submission
        // still reviews the week that just ended.
        let (week_start, week_end) = week_bounds(today - chrono::Duration::days(1));
        let (completed, failed) = self.weekly_steps(user_id, week_start, week_end)?;
        let mood_avg = self.week_mood_avg(user_id, week_start, week_end)?;

        let payload = WeekPayload {
            week_dates: format!("{} - {}", week_start.format("%d.%m"), week_end.format("%d.%m")),
            completed_steps: step_summaries(&completed),
            failed_steps: step_summaries(&failed),
            mood_avg,
            user_reflection: reflection.to_string(),
        };
        let request = AnalysisRequest::weekly_review(user_name, payload);

        let analysis = match tokio::time::timeout(
            self.generation_timeout,
            self.provider.analyze(&request),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(EngineError::Generation(GenerationError::Timeout(
                    self.generation_timeout,
                )))
            }
        };

        let completed_ids: Vec<StepId> = completed.iter().map(|s| s.id.clone()).collect();
        let failed_ids: Vec<StepId> = failed.iter().map(|s| s.id.clone()).collect();
        let analysis_json =
            serde_json::to_value(&analysis).map_err(|e| EngineError::Store(e.into()))?;

        self.create_weekly_review(
            user_id,
            week_start,
            week_end,
            &completed_ids,
            &failed_ids,
            reflection,
            &analysis_json,
        )
    }
}

fn step_summaries(steps: &[StepRow]) -> Vec<StepSummary> {
    steps
        .iter()
        .map(|s| StepSummary {
            title: s.title.clone(),
            area: None,
        })
        .collect()
}
