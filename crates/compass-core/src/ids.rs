use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! branded_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(UserId, "user");
branded_id!(WantsId, "wants");
branded_id!(ChunkId, "chunk");
branded_id!(EntryId, "entry");
branded_id!(ReviewId, "review");
branded_id!(StepId, "step");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_have_prefixes() {
        assert!(UserId::new().as_str().starts_with("user_"));
        assert!(WantsId::new().as_str().starts_with("wants_"));
        assert!(ChunkId::new().as_str().starts_with("chunk_"));
        assert!(EntryId::new().as_str().starts_with("entry_"));
        assert!(ReviewId::new().as_str().starts_with("review_"));
        assert!(StepId::new().as_str().starts_with("step_"));
    }

    #[test]
    fn ids_are_unique() {
        let a = WantsId::new();
        let b = WantsId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_and_from_str_roundtrip() {
        let id = ReviewId::new();
        let s = id.to_string();
        let parsed: ReviewId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_roundtrip() {
        let id = EntryId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: EntryId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_raw_preserves_value() {
        let id = UserId::from_raw("user_external-7");
        assert_eq!(id.as_str(), "user_external-7");
    }

    #[test]
    fn monotonic_ordering() {
        let ids: Vec<ChunkId> = (0..100).map(|_| ChunkId::new()).collect();
        for w in ids.windows(2) {
            assert!(w[0].as_str() < w[1].as_str(), "not monotonic: {} >= {}", w[0], w[1]);
        }
    }
}
