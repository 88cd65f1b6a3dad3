//! Local keyword knowledge base.
//!
//! Answers the common kiosk requests without a network round trip. An entry
//! matches when every one of its keywords occurs in the normalised
//! transcript; among matching entries the one with the most keywords wins,
//! ties going to the earlier entry.

use kiosk_core::{KioskAction, KnowledgeBase, KnowledgeReply, Language, PaymentMethod, Screen};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::text;

/// Reply text per supported language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    pub hi: String,
}

impl LocalizedText {
    pub fn new(en: impl Into<String>, hi: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            hi: hi.into(),
        }
    }

    #[must_use]
    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::En => &self.en,
            Language::Hi => &self.hi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub keywords: Vec<String>,
    pub reply: LocalizedText,
    #[serde(default)]
    pub action: KioskAction,
}

impl KnowledgeEntry {
    pub fn new(keywords: &[&str], reply: LocalizedText, action: KioskAction) -> Self {
        Self {
            keywords: keywords.iter().map(|k| text::normalize(k)).collect(),
            reply,
            action,
        }
    }

    fn matches(&self, normalized: &str) -> bool {
        !self.keywords.is_empty()
            && self
                .keywords
                .iter()
                .all(|keyword| text::contains_phrase(normalized, keyword))
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeywordKnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KeywordKnowledgeBase {
    /// Build from entries; keywords are normalised on the way in.
    #[must_use]
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|mut entry| {
                entry.keywords = entry.keywords.iter().map(|k| text::normalize(k)).collect();
                entry
            })
            .collect();
        Self { entries }
    }

    /// Load entries from a JSON array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Vec<KnowledgeEntry>>(json).map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The built-in catalogue of civic-service requests.
    #[must_use]
    pub fn civic_services() -> Self {
        let navigate = |screen| KioskAction::Navigate { screen };
        let pay_with = |method| KioskAction::PaymentMethodSelected { method };

        Self::new(vec![
            KnowledgeEntry::new(
                &["electricity", "bill"],
                LocalizedText::new(
                    "Opening your electricity bill. Please say or type your consumer number.",
                    "आपका बिजली बिल खोल रहा हूँ। कृपया अपना उपभोक्ता नंबर बोलें या लिखें।",
                ),
                navigate(Screen::ElectricityBill),
            ),
            KnowledgeEntry::new(
                &["bijli", "bill"],
                LocalizedText::new(
                    "Opening your electricity bill. Please say or type your consumer number.",
                    "आपका बिजली बिल खोल रहा हूँ। कृपया अपना उपभोक्ता नंबर बोलें या लिखें।",
                ),
                navigate(Screen::ElectricityBill),
            ),
            KnowledgeEntry::new(
                &["बिजली", "बिल"],
                LocalizedText::new(
                    "Opening your electricity bill. Please say or type your consumer number.",
                    "आपका बिजली बिल खोल रहा हूँ। कृपया अपना उपभोक्ता नंबर बोलें या लिखें।",
                ),
                navigate(Screen::ElectricityBill),
            ),
            KnowledgeEntry::new(
                &["water", "bill"],
                LocalizedText::new(
                    "Opening your water bill. Please say your connection number.",
                    "आपका पानी का बिल खोल रहा हूँ। कृपया अपना कनेक्शन नंबर बोलें।",
                ),
                navigate(Screen::WaterBill),
            ),
            KnowledgeEntry::new(
                &["पानी", "बिल"],
                LocalizedText::new(
                    "Opening your water bill. Please say your connection number.",
                    "आपका पानी का बिल खोल रहा हूँ। कृपया अपना कनेक्शन नंबर बोलें।",
                ),
                navigate(Screen::WaterBill),
            ),
            KnowledgeEntry::new(
                &["gas", "bill"],
                LocalizedText::new(
                    "Opening your gas bill.",
                    "आपका गैस बिल खोल रहा हूँ।",
                ),
                navigate(Screen::GasBill),
            ),
            KnowledgeEntry::new(
                &["property", "tax"],
                LocalizedText::new(
                    "Opening property tax. Please say your property ID.",
                    "संपत्ति कर खोल रहा हूँ। कृपया अपनी संपत्ति आईडी बोलें।",
                ),
                navigate(Screen::PropertyTax),
            ),
            KnowledgeEntry::new(
                &["complaint", "status"],
                LocalizedText::new(
                    "Let's check your complaint status. Please say your complaint number.",
                    "आइए आपकी शिकायत की स्थिति देखें। कृपया अपना शिकायत नंबर बोलें।",
                ),
                navigate(Screen::ComplaintStatus),
            ),
            KnowledgeEntry::new(
                &["track", "complaint"],
                LocalizedText::new(
                    "Let's check your complaint status. Please say your complaint number.",
                    "आइए आपकी शिकायत की स्थिति देखें। कृपया अपना शिकायत नंबर बोलें।",
                ),
                navigate(Screen::ComplaintStatus),
            ),
            KnowledgeEntry::new(
                &["file", "complaint"],
                LocalizedText::new(
                    "Opening the complaint form. Please describe the problem.",
                    "शिकायत फ़ॉर्म खोल रहा हूँ। कृपया समस्या बताएं।",
                ),
                navigate(Screen::Complaint),
            ),
            KnowledgeEntry::new(
                &["register", "complaint"],
                LocalizedText::new(
                    "Opening the complaint form. Please describe the problem.",
                    "शिकायत फ़ॉर्म खोल रहा हूँ। कृपया समस्या बताएं।",
                ),
                navigate(Screen::Complaint),
            ),
            KnowledgeEntry::new(
                &["pay", "upi"],
                LocalizedText::new(
                    "Paying by UPI. Please scan the QR code on the screen.",
                    "यूपीआई से भुगतान। कृपया स्क्रीन पर दिया QR कोड स्कैन करें।",
                ),
                pay_with(PaymentMethod::Upi),
            ),
            KnowledgeEntry::new(
                &["pay", "card"],
                LocalizedText::new(
                    "Paying by card. Please insert or tap your card.",
                    "कार्ड से भुगतान। कृपया अपना कार्ड डालें या टैप करें।",
                ),
                pay_with(PaymentMethod::Card),
            ),
            KnowledgeEntry::new(
                &["pay", "cash"],
                LocalizedText::new(
                    "Paying by cash. Please insert the notes one at a time.",
                    "नकद भुगतान। कृपया नोट एक-एक करके डालें।",
                ),
                pay_with(PaymentMethod::Cash),
            ),
            KnowledgeEntry::new(
                &["main", "menu"],
                LocalizedText::new(
                    "Going back to the main menu.",
                    "मुख्य मेनू पर जा रहा हूँ।",
                ),
                navigate(Screen::Home),
            ),
            KnowledgeEntry::new(
                &["go", "home"],
                LocalizedText::new(
                    "Going back to the main menu.",
                    "मुख्य मेनू पर जा रहा हूँ।",
                ),
                navigate(Screen::Home),
            ),
        ])
    }
}

impl KnowledgeBase for KeywordKnowledgeBase {
    fn lookup(&self, transcript: &str, language: &str) -> Option<KnowledgeReply> {
        let normalized = text::normalize(transcript);
        let language = Language::from_tag(language);

        let mut best: Option<&KnowledgeEntry> = None;
        for entry in self.entries.iter().filter(|e| e.matches(&normalized)) {
            if best.is_none_or(|b| entry.keywords.len() > b.keywords.len()) {
                best = Some(entry);
            }
        }

        let entry = best?;
        debug!(keywords = ?entry.keywords, action = entry.action.label(), "Knowledge base hit");
        Some(KnowledgeReply {
            text: entry.reply.get(language).to_string(),
            action: entry.action.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_civic_lookup() {
        let kb = KeywordKnowledgeBase::civic_services();
        let reply = kb.lookup("Electricity bill", "en-IN").unwrap();
        assert_eq!(reply.action, KioskAction::Navigate { screen: Screen::ElectricityBill });
        assert!(reply.text.starts_with("Opening your electricity bill"));
    }

    #[test]
    fn test_all_keywords_required() {
        let kb = KeywordKnowledgeBase::civic_services();
        assert!(kb.lookup("electricity", "en-IN").is_none());
        assert!(kb.lookup("I want to know the weather", "en-IN").is_none());
    }

    #[test]
    fn test_reply_follows_session_language() {
        let kb = KeywordKnowledgeBase::civic_services();
        let reply = kb.lookup("बिजली का बिल", "hi-IN").unwrap();
        assert_eq!(reply.action, KioskAction::Navigate { screen: Screen::ElectricityBill });
        assert!(reply.text.contains("बिजली"));
    }

    #[test]
    fn test_most_specific_entry_wins() {
        let kb = KeywordKnowledgeBase::new(vec![
            KnowledgeEntry::new(
                &["complaint"],
                LocalizedText::new("complaint", "शिकायत"),
                KioskAction::Navigate { screen: Screen::Complaint },
            ),
            KnowledgeEntry::new(
                &["complaint", "status"],
                LocalizedText::new("status", "स्थिति"),
                KioskAction::Navigate { screen: Screen::ComplaintStatus },
            ),
        ]);
        let reply = kb.lookup("what is my complaint status", "en").unwrap();
        assert_eq!(reply.text, "status");
        assert_eq!(kb.lookup("new complaint", "en").unwrap().text, "complaint");
    }

    #[test]
    fn test_from_json() {
        let kb = KeywordKnowledgeBase::from_json(
            r#"[{
                "keywords": ["Ration", "Card"],
                "reply": { "en": "Opening services.", "hi": "सेवाएं खोल रहा हूँ।" },
                "action": { "type": "navigate", "screen": "services" }
            }]"#,
        )
        .unwrap();
        assert_eq!(kb.len(), 1);
        let reply = kb.lookup("ration card please", "en-IN").unwrap();
        assert_eq!(reply.action, KioskAction::Navigate { screen: Screen::Services });
    }
}
