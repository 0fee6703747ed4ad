pub mod cache;
pub mod error;
pub mod gamification;
pub mod rituals;
pub mod wants;

pub use error::{EngineError, MissingPart};
pub use gamification::GamificationService;
pub use rituals::RitualService;
pub use wants::WantsService;
