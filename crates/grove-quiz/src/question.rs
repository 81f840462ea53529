//! Question model
//!
//! Questions are immutable once loaded. Identifiers are opaque strings
//! supplied by the content source and travel unchanged over the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier
            #[inline]
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Raw identifier
            #[inline]
            #[must_use]
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
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

string_id!(
    /// Lesson identifier
    LessonId
);
string_id!(
    /// Module (group of lessons) identifier
    ModuleId
);
string_id!(
    /// Question identifier, unique within a lesson
    QuestionId
);
string_id!(
    /// Answer option identifier, unique within a question
    OptionId
);

/// One selectable answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    /// Option ID
    pub id: OptionId,
    /// Display text
    pub text: String,
}

impl AnswerOption {
    /// Create new option
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<OptionId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A multiple-choice question with exactly one correct option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Question ID
    pub id: QuestionId,
    /// Prompt text
    pub text: String,
    /// Options in display order
    pub options: Vec<AnswerOption>,
    /// The correct option
    pub correct_option_id: OptionId,
    /// Explanation shown after answering
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    /// Create new question
    #[must_use]
    pub fn new(
        id: impl Into<QuestionId>,
        text: impl Into<String>,
        options: Vec<AnswerOption>,
        correct_option_id: impl Into<OptionId>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            options,
            correct_option_id: correct_option_id.into(),
            explanation: String::new(),
        }
    }

    /// With explanation text
    #[inline]
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Check whether `option` is one of this question's options
    #[inline]
    #[must_use]
    pub fn has_option(&self, option: &OptionId) -> bool {
        self.options.iter().any(|o| &o.id == option)
    }

    /// A question is well formed when its correct option is listed
    #[inline]
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.has_option(&self.correct_option_id)
    }
}
