//! Reply languages supported by the kiosk.

use serde::{Deserialize, Serialize};

/// A language the kiosk can speak replies in.
///
/// Recognition and synthesis receive the original BCP-47 tag; this enum only
/// selects which phrase set to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
}

impl Language {
    /// Reduce a BCP-47 tag (`"hi-IN"`, `"en_GB"`) to a supported language.
    ///
    /// Unsupported languages fall back to English.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match primary.as_str() {
            "hi" => Self::Hi,
            _ => Self::En,
        }
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Hi => "hi",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_subtag_selects_language() {
        assert_eq!(Language::from_tag("hi-IN"), Language::Hi);
        assert_eq!(Language::from_tag("HI"), Language::Hi);
        assert_eq!(Language::from_tag("en_GB"), Language::En);
    }

    #[test]
    fn unsupported_falls_back_to_english() {
        assert_eq!(Language::from_tag("ta-IN"), Language::En);
        assert_eq!(Language::from_tag(""), Language::En);
    }
}
