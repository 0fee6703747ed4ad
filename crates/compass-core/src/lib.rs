pub mod analysis;
pub mod errors;
pub mod ids;
pub mod week;

pub use analysis::{AnalysisProvider, AnalysisRequest, WeeklyAnalysis};
pub use errors::GenerationError;
