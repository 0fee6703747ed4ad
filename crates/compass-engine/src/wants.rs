use serde::{Deserialize, Serialize};
use tracing::instrument;

use compass_core::ids::{UserId, WantsId};
use compass_store::error::StoreError;
use compass_store::wants::{ChunkExercise, WantsRepo, WantsRow, WantsStatus};
use compass_store::Database;

use crate::error::{EngineError, MissingPart};

/// Recognized stream-phase stop tokens, compared after trim + casefold.
const STOP_TOKENS: [&str; 2] = ["стоп", "stop"];

fn is_stop_token(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    STOP_TOKENS.contains(&t.as_str())
}

fn is_blank(text: Option<&str>) -> bool {
    text.map_or(true, |t| t.trim().is_empty())
}

/// Join a fragment onto an accumulated buffer with a single newline.
fn join_buffer(current: Option<&str>, text: &str) -> String {
    let trimmed = current.unwrap_or_default().trim_end();
    if trimmed.is_empty() {
        text.to_string()
    } else {
        format!("{trimmed}\n{text}")
    }
}

/// Partial update for the three reverse-question answers. Only provided
/// fields overwrite; there is no way to clear a field through this path.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReverseAnswers {
    pub envy: Option<String>,
    pub regrets: Option<String>,
    pub plan_5y: Option<String>,
}

/// One page of completed records, newest first.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryPage {
    pub items: Vec<WantsRow>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Drives the three reflective-writing exercises of the wants intake and
/// gates the terminal completed transition.
pub struct WantsService {
    repo: WantsRepo,
}

impl WantsService {
    pub fn new(db: Database) -> Self {
        Self {
            repo: WantsRepo::new(db),
        }
    }

    /// The owner's current draft, lazily materialized.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn get_or_create_draft(&self, user_id: &UserId) -> Result<WantsRow, EngineError> {
        if let Some(draft) = self.repo.get_draft(user_id)? {
            return Ok(draft);
        }
        match self.repo.insert_draft(user_id) {
            Ok(draft) => Ok(draft),
            // Lost a concurrent creation race; the other writer's draft wins.
            Err(StoreError::Conflict(_)) => {
                self.repo.get_draft(user_id)?.ok_or_else(|| {
                    EngineError::NotFound(format!("draft for {user_id}"))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_mutable(record: &WantsRow) -> Result<(), EngineError> {
        if record.status != WantsStatus::Draft {
            return Err(EngineError::Immutable);
        }
        Ok(())
    }

    fn mutable_draft(&self, user_id: &UserId) -> Result<WantsRow, EngineError> {
        let draft = self.get_or_create_draft(user_id)?;
        Self::ensure_mutable(&draft)?;
        Ok(draft)
    }

    /// Stamp the stream start time; repeated calls never reset it. The timer
    /// duration on the returned record is advisory only.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn start_stream_phase(&self, user_id: &UserId) -> Result<WantsRow, EngineError> {
        let draft = self.mutable_draft(user_id)?;
        if draft.stream_started_at.is_none() {
            self.repo.start_stream(&draft.id)?;
        }
        Ok(self.repo.get(&draft.id)?)
    }

    /// Append a fragment to the stream buffer, or finish the phase when the
    /// fragment is a stop token. Returns the record and whether this call
    /// triggered completion.
    #[instrument(skip(self, text), fields(user_id = %user_id))]
    pub fn append_stream_text(
        &self,
        user_id: &UserId,
        text: &str,
    ) -> Result<(WantsRow, bool), EngineError> {
        let draft = self.mutable_draft(user_id)?;

        if draft.stream_started_at.is_none() {
            self.repo.start_stream(&draft.id)?;
        }

        if is_stop_token(text) {
            if draft.stream_completed_at.is_none() {
                self.repo.complete_stream(&draft.id)?;
            }
            return Ok((self.repo.get(&draft.id)?, true));
        }

        let buffer = join_buffer(draft.stream_text.as_deref(), text);
        self.repo.set_stream_text(&draft.id, &buffer)?;
        self.repo.insert_chunk(&draft.id, ChunkExercise::Stream, text)?;
        Ok((self.repo.get(&draft.id)?, false))
    }

    /// Finish the stream phase without requiring the stop token. Idempotent,
    /// no content validation.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn finish_stream_phase(&self, user_id: &UserId) -> Result<WantsRow, EngineError> {
        let draft = self.mutable_draft(user_id)?;
        self.repo.complete_stream(&draft.id)?;
        Ok(self.repo.get(&draft.id)?)
    }

    /// Overwrite the future-self buffer wholesale.
    #[instrument(skip(self, text), fields(user_id = %user_id))]
    pub fn set_future_self_text(&self, user_id: &UserId, text: &str) -> Result<WantsRow, EngineError> {
        let draft = self.mutable_draft(user_id)?;
        self.repo.set_future_self_text(&draft.id, text)?;
        Ok(self.repo.get(&draft.id)?)
    }

    /// Append to the future-self buffer with the same newline-join rule as
    /// the stream phase.
    #[instrument(skip(self, text), fields(user_id = %user_id))]
    pub fn append_future_self_text(
        &self,
        user_id: &UserId,
        text: &str,
    ) -> Result<WantsRow, EngineError> {
        let draft = self.mutable_draft(user_id)?;
        let buffer = join_buffer(draft.future_self_text.as_deref(), text);
        self.repo.set_future_self_text(&draft.id, &buffer)?;
        self.repo.insert_chunk(&draft.id, ChunkExercise::FutureSelf, text)?;
        Ok(self.repo.get(&draft.id)?)
    }

    /// Finish the future-self phase. Idempotent, no content validation.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn finish_future_self_phase(&self, user_id: &UserId) -> Result<WantsRow, EngineError> {
        let draft = self.mutable_draft(user_id)?;
        self.repo.complete_future_self(&draft.id)?;
        Ok(self.repo.get(&draft.id)?)
    }

    /// Apply a partial update to the reverse answers. Once all three are
    /// non-blank the phase completion time is stamped and never reset.
    #[instrument(skip(self, answers), fields(user_id = %user_id))]
    pub fn update_reverse_answers(
        &self,
        user_id: &UserId,
        answers: &ReverseAnswers,
    ) -> Result<WantsRow, EngineError> {
        let draft = self.mutable_draft(user_id)?;

        let envy = answers.envy.as_deref().or(draft.envy.as_deref());
        let regrets = answers.regrets.as_deref().or(draft.regrets.as_deref());
        let plan_5y = answers.plan_5y.as_deref().or(draft.plan_5y.as_deref());

        let all_filled = !is_blank(envy) && !is_blank(regrets) && !is_blank(plan_5y);
        self.repo.set_reverse(&draft.id, envy, regrets, plan_5y, all_filled)?;
        Ok(self.repo.get(&draft.id)?)
    }

    /// The current draft for client rendering.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn progress(&self, user_id: &UserId) -> Result<WantsRow, EngineError> {
        self.get_or_create_draft(user_id)
    }

    /// Transition draft → completed, or fail with the exact list of parts
    /// still missing.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn complete(&self, user_id: &UserId) -> Result<WantsRow, EngineError> {
        let draft = self.mutable_draft(user_id)?;

        let missing = validate_complete(&draft);
        if !missing.is_empty() {
            return Err(EngineError::NotReady(missing));
        }

        self.repo.mark_completed(&draft.id)?;
        Ok(self.repo.get(&draft.id)?)
    }

    /// Completed records only, newest first.
    #[instrument(skip(self), fields(user_id = %user_id, page, page_size))]
    pub fn list_history(
        &self,
        user_id: &UserId,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, EngineError> {
        let page = page.max(1);
        let page_size = if page_size == 0 { 10 } else { page_size };

        let total = self.repo.history_count(user_id)?;
        let offset = (page - 1) * page_size;
        let items = self.repo.history_page(user_id, page_size, offset)?;

        Ok(HistoryPage {
            items,
            total,
            page,
            page_size,
            has_next: u64::from(page) * u64::from(page_size) < total,
            has_prev: page > 1,
        })
    }

    /// A single completed record scoped to its owner.
    #[instrument(skip(self), fields(user_id = %user_id, wants_id = %id))]
    pub fn get_completed(&self, user_id: &UserId, id: &WantsId) -> Result<WantsRow, EngineError> {
        self.repo
            .get_completed(user_id, id)?
            .ok_or_else(|| EngineError::NotFound(format!("wants {id}")))
    }
}

fn validate_complete(record: &WantsRow) -> Vec<MissingPart> {
    let mut missing = Vec::new();

    if record.stream_completed_at.is_none() || is_blank(record.stream_text.as_deref()) {
        missing.push(MissingPart::Stream);
    }
    if record.future_self_completed_at.is_none() || is_blank(record.future_self_text.as_deref()) {
        missing.push(MissingPart::FutureSelf);
    }
    if record.reverse_completed_at.is_none() {
        missing.push(MissingPart::Reverse);
    } else {
        if is_blank(record.envy.as_deref()) {
            missing.push(MissingPart::Envy);
        }
        if is_blank(record.regrets.as_deref()) {
            missing.push(MissingPart::Regrets);
        }
        if is_blank(record.plan_5y.as_deref()) {
            missing.push(MissingPart::Plan5y);
        }
    }

    missing
}
