use axum::extract::State;
use axum::Json;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Deserialize;

use compass_core::ids::StepId;
use compass_engine::gamification::ActionType;
use compass_engine::rituals::RitualsToday;
use compass_store::journal::JournalSlot;
use compass_store::steps::StepRow;

use crate::error::ApiError;
use crate::identity::Owner;
use crate::server::AppState;

#[derive(Deserialize)]
pub struct JournalEntryIn {
    pub slot: JournalSlot,
    pub answers: serde_json::Value,
    pub mood_score: Option<i32>,
    pub energy_score: Option<i32>,
}

#[derive(Deserialize)]
pub struct WeeklyAnalyzeIn {
    pub reflection: String,
}

#[derive(Deserialize)]
pub struct WeeklyCommitIn {
    pub step_ids: Vec<String>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "response serialization failed");
        ApiError::new(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "Internal error",
        )
    })
}

fn validate_score(name: &str, score: Option<i32>) -> Result<(), ApiError> {
    if let Some(value) = score {
        if !(1..=10).contains(&value) {
            return Err(ApiError::invalid_params(format!(
                "{name} must be between 1 and 10"
            )));
        }
    }
    Ok(())
}

/// Today's slot status plus the interception evaluation; reading this may
/// auto-archive a stale week as a side effect.
pub async fn today_status(
    State(state): State<AppState>,
    Owner(user): Owner,
) -> Result<Json<RitualsToday>, ApiError> {
    Ok(Json(state.rituals.today_status_with_interception(&user, today())?))
}

pub async fn entry(
    State(state): State<AppState>,
    Owner(user): Owner,
    Json(body): Json<JournalEntryIn>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_score("mood_score", body.mood_score)?;
    validate_score("energy_score", body.energy_score)?;

    let date = today();
    let entry = state.rituals.create_journal_entry(
        &user,
        date,
        body.slot,
        &body.answers,
        body.mood_score,
        body.energy_score,
    )?;

    let action = match body.slot {
        JournalSlot::Morning => ActionType::MorningRitual,
        JournalSlot::Evening => ActionType::EveningRitual,
    };
    let award = state.gamification.award(&user, action, date)?;
    let event = state.gamification.build_event(action, &award);

    let mut result = to_json(&entry)?;
    result["gamification_event"] = to_json(&event)?;
    Ok(Json(result))
}

pub async fn weekly_analyze(
    State(state): State<AppState>,
    Owner(user): Owner,
    Json(body): Json<WeeklyAnalyzeIn>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.reflection.trim().is_empty() {
        return Err(ApiError::invalid_params("reflection must not be empty"));
    }

    let date = today();
    let review = state
        .rituals
        .analyze_week(&user, date, &body.reflection, None)
        .await?;

    let award = state
        .gamification
        .award(&user, ActionType::WeeklyReviewComplete, date)?;
    let event = state.gamification.build_event(ActionType::WeeklyReviewComplete, &award);

    let mut result = to_json(&review)?;
    result["gamification_event"] = to_json(&event)?;
    Ok(Json(result))
}

pub async fn plan_suggestion(
    State(state): State<AppState>,
    Owner(user): Owner,
) -> Result<Json<Vec<StepRow>>, ApiError> {
    Ok(Json(state.rituals.plan_suggestion(&user, 20)?))
}

pub async fn weekly_commit(
    State(state): State<AppState>,
    Owner(user): Owner,
    Json(body): Json<WeeklyCommitIn>,
) -> Result<Json<Vec<StepRow>>, ApiError> {
    if body.step_ids.is_empty() {
        return Err(ApiError::invalid_params("step_ids must not be empty"));
    }
    let step_ids: Vec<StepId> = body.step_ids.into_iter().map(StepId::from_raw).collect();

    // Commitments target the week that starts next Monday.
    let date = today();
    let next_week_start =
        date + Duration::days(7 - i64::from(date.weekday().num_days_from_monday()));

    Ok(Json(state.rituals.commit_week_plan(&user, &step_ids, next_week_start)?))
}
