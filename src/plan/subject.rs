use std::fmt;

use icu_normalizer::ComposingNormalizerBorrowed;
use serde::{Deserialize, Serialize};

/// Subjects offered by the planner. Declaration order is the display order
/// and the order risk rules scan in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    #[serde(rename = "Toán")]
    Math,
    #[serde(rename = "Tiếng Anh")]
    English,
}

pub const ALL_SUBJECTS: [Subject; 2] = [Subject::Math, Subject::English];

impl Subject {
    pub fn label(self) -> &'static str {
        match self {
            Subject::Math => "Toán",
            Subject::English => "Tiếng Anh",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Subject::Math => 0,
            Subject::English => 1,
        }
    }

    /// Parse a subject label typed by a user or read from an external feed.
    /// Labels are NFC-normalized first so decomposed diacritics still match.
    pub fn from_label(label: &str) -> Option<Self> {
        let nfc = ComposingNormalizerBorrowed::new_nfc().normalize(label.trim());
        ALL_SUBJECTS
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(&nfc))
    }

    pub fn next(self) -> Self {
        ALL_SUBJECTS[(self.index() + 1) % ALL_SUBJECTS.len()]
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
