use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use compass_core::analysis::{AnalysisProvider, AnalysisRequest, WeeklyAnalysis};
use compass_core::errors::GenerationError;

/// Pre-programmed responses for deterministic testing without a proxy.
pub enum MockResponse {
    /// Return an analysis.
    Analysis(WeeklyAnalysis),
    /// Return an error.
    Error(GenerationError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// Convenience: wrap any response with a delay.
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider that returns pre-programmed responses in sequence.
pub struct MockProvider {
    responses: Mutex<VecDeque<MockResponse>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AnalysisProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(&self, _request: &AnalysisRequest) -> Result<WeeklyAnalysis, GenerationError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);

        let response = self
            .responses
            .lock()
            .expect("mock responses poisoned")
            .pop_front();
        let Some(response) = response else {
            return Err(GenerationError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )));
        };

        resolve_response(response).await
    }
}

/// Resolve a MockResponse, handling Delay by sleeping first.
/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(response: MockResponse) -> Result<WeeklyAnalysis, GenerationError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Analysis(analysis) => return Ok(analysis),
            MockResponse::Error(e) => return Err(e),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> WeeklyAnalysis {
        WeeklyAnalysis {
            summary: "a week".into(),
            score: 6,
            feedback: serde_json::json!({}),
            questions_for_reflection: vec![],
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::weekly_review(
            None,
            compass_core::analysis::WeekPayload {
                week_dates: "02.06 - 08.06".into(),
                completed_steps: vec![],
                failed_steps: vec![],
                mood_avg: None,
                user_reflection: String::new(),
            },
        )
    }

    #[tokio::test]
    async fn returns_analysis() {
        let mock = MockProvider::new(vec![MockResponse::Analysis(analysis())]);
        let result = mock.analyze(&request()).await.unwrap();
        assert_eq!(result.score, 6);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn returns_error() {
        let mock = MockProvider::new(vec![MockResponse::Error(
            GenerationError::InvalidResponse("bad".into()),
        )]);
        let result = mock.analyze(&request()).await;
        assert!(matches!(result, Err(GenerationError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn sequential_responses_in_order() {
        let mock = MockProvider::new(vec![
            MockResponse::Analysis(WeeklyAnalysis { score: 1, ..analysis() }),
            MockResponse::Analysis(WeeklyAnalysis { score: 2, ..analysis() }),
        ]);

        assert_eq!(mock.analyze(&request()).await.unwrap().score, 1);
        assert_eq!(mock.analyze(&request()).await.unwrap().score, 2);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_responses_error() {
        let mock = MockProvider::new(vec![MockResponse::Analysis(analysis())]);
        let _ = mock.analyze(&request()).await;
        let result = mock.analyze(&request()).await;
        assert!(matches!(result, Err(GenerationError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn delayed_response_waits() {
        let mock = MockProvider::new(vec![MockResponse::delayed(
            Duration::from_millis(50),
            MockResponse::Analysis(analysis()),
        )]);

        let start = std::time::Instant::now();
        let result = mock.analyze(&request()).await;
        assert!(result.is_ok());
        assert!(
            start.elapsed() >= Duration::from_millis(40),
            "delay should have waited ~50ms, got {:?}",
            start.elapsed()
        );
    }
}
