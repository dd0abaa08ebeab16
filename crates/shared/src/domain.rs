use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

macro_rules! string_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(MessageId);
id_newtype!(RequestId);
id_newtype!(TurnId);

string_id_newtype!(SessionId);
string_id_newtype!(InteractionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    ThumbsUp,
    ThumbsDown,
    FormatMismatch,
    TooLong,
    TooShort,
    OffTopic,
}

impl FeedbackKind {
    pub const ALL: [FeedbackKind; 6] = [
        FeedbackKind::ThumbsUp,
        FeedbackKind::ThumbsDown,
        FeedbackKind::FormatMismatch,
        FeedbackKind::TooLong,
        FeedbackKind::TooShort,
        FeedbackKind::OffTopic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::ThumbsUp => "thumbs_up",
            FeedbackKind::ThumbsDown => "thumbs_down",
            FeedbackKind::FormatMismatch => "format_mismatch",
            FeedbackKind::TooLong => "too_long",
            FeedbackKind::TooShort => "too_short",
            FeedbackKind::OffTopic => "off_topic",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown feedback type '{0}'")]
pub struct UnknownFeedbackKind(pub String);

impl FromStr for FeedbackKind {
    type Err = UnknownFeedbackKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        FeedbackKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownFeedbackKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_kind_parses_wire_names_and_dashes() {
        assert_eq!(
            "thumbs_up".parse::<FeedbackKind>(),
            Ok(FeedbackKind::ThumbsUp)
        );
        assert_eq!(
            "Too-Long".parse::<FeedbackKind>(),
            Ok(FeedbackKind::TooLong)
        );
        assert!("love_it".parse::<FeedbackKind>().is_err());
    }

    #[test]
    fn feedback_kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&FeedbackKind::FormatMismatch).expect("serialize");
        assert_eq!(json, "\"format_mismatch\"");
    }

    #[test]
    fn session_id_is_transparent_on_the_wire() {
        let json = serde_json::to_string(&SessionId::new("s-1")).expect("serialize");
        assert_eq!(json, "\"s-1\"");
    }
}
