//! Text helpers shared by the transcript filter, the knowledge base and
//! playback.
//!
//! Two directions:
//! - inbound transcripts are normalised for matching (lowercase, punctuation
//!   folded to spaces, single-spaced)
//! - outbound replies are cleaned of markup so the synthesizer does not read
//!   asterisks and link targets aloud

/// Normalise a transcript for keyword matching.
///
/// Lowercases, folds punctuation (ASCII and Devanagari danda) to spaces and
/// collapses whitespace. Combining marks are preserved so Hindi words survive.
#[must_use]
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .chars()
        .map(|c| if is_punctuation(c) { ' ' } else { c })
        .flat_map(char::to_lowercase)
        .collect();
    collapse_whitespace(&folded)
}

/// Whether `phrase` occurs in `normalized` on word boundaries.
///
/// Both sides are expected to be normalised already.
#[must_use]
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    format!(" {normalized} ").contains(&format!(" {phrase} "))
}

/// Whether every word of `normalized` is a filler word.
#[must_use]
pub fn is_filler(normalized: &str, fillers: &[String]) -> bool {
    let mut words = normalized.split_whitespace().peekable();
    if words.peek().is_none() {
        return false;
    }
    words.all(|word| fillers.iter().any(|f| f == word))
}

/// Strip markup from a reply so it reads naturally when spoken.
///
/// Handles headings, list markers, emphasis, inline code and
/// `[text](url)` links. Everything is joined onto one line.
#[must_use]
pub fn for_speech(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let line = strip_line_markup(line.trim());
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(line);
    }

    collapse_whitespace(&result)
}

fn strip_line_markup(line: &str) -> String {
    let mut s = line.trim_start_matches('#').trim_start();
    s = s
        .strip_prefix("- ")
        .or_else(|| s.strip_prefix("* "))
        .or_else(|| s.strip_prefix("+ "))
        .unwrap_or(s);

    let s = strip_links(s);
    s.chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '~'))
        .collect()
}

fn strip_links(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '[' {
            result.push(c);
            continue;
        }
        let label: String = chars.by_ref().take_while(|&c| c != ']').collect();
        if chars.peek() == Some(&'(') {
            chars.next();
            // Drop the target
            for c in chars.by_ref() {
                if c == ')' {
                    break;
                }
            }
        }
        result.push_str(&label);
    }

    result
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

const fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '।' | '॥' | '…' | '“' | '”' | '‘' | '’' | '¿' | '¡')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fillers() -> Vec<String> {
        ["um", "uh", "hmm"].iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_normalize_folds_case_and_punctuation() {
        assert_eq!(normalize("  Electricity-Bill, please! "), "electricity bill please");
        assert_eq!(normalize("बिजली का बिल।"), "बिजली का बिल");
    }

    #[test]
    fn test_contains_phrase_respects_word_boundaries() {
        assert!(contains_phrase("pay my water bill", "water bill"));
        assert!(contains_phrase("no", "no"));
        assert!(!contains_phrase("i know now", "no"));
        assert!(!contains_phrase("anything", ""));
    }

    #[test]
    fn test_filler_detection() {
        assert!(is_filler("um", &fillers()));
        assert!(is_filler("um uh hmm", &fillers()));
        assert!(!is_filler("um water", &fillers()));
        assert!(!is_filler("", &fillers()));
    }

    #[test]
    fn test_for_speech_strips_markup() {
        let reply = "## Your bill\n- **Amount:** ₹450\n- Pay at [the portal](https://example.org)";
        assert_eq!(
            for_speech(reply),
            "Your bill Amount: ₹450 Pay at the portal"
        );
    }

    #[test]
    fn test_for_speech_plain_text_unchanged() {
        assert_eq!(for_speech("Opening your water bill."), "Opening your water bill.");
        assert_eq!(for_speech("   \n  "), "");
    }
}
