//! Offline replies used when the remote dialogue service is unreachable.
//!
//! Infers a coarse intent from keywords in the transcript so the kiosk can
//! still move the citizen forward. Categories are checked in order.

use kiosk_core::{Answer, KioskAction, Language, Screen};

use crate::phrases::Phrasebook;
use crate::text;

struct Category {
    keywords: &'static [&'static str],
    en: &'static str,
    hi: &'static str,
    action: KioskAction,
}

/// Built from the ordered category table.
pub struct OfflineReplies {
    categories: Vec<Category>,
}

impl Default for OfflineReplies {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineReplies {
    #[must_use]
    pub fn new() -> Self {
        let navigate = |screen| KioskAction::Navigate { screen };
        let categories = vec![
            Category {
                keywords: &["stop", "bye", "goodbye", "exit", "band karo", "बंद", "रुको"],
                en: "Okay, I'll stop listening now. Goodbye.",
                hi: "ठीक है, मैं अब सुनना बंद कर रहा हूँ। नमस्ते।",
                action: KioskAction::StopSession,
            },
            Category {
                keywords: &["back", "previous", "peeche", "वापस", "पीछे"],
                en: "Going back.",
                hi: "पीछे जा रहा हूँ।",
                action: KioskAction::GoBack,
            },
            Category {
                keywords: &["yes", "yeah", "haan", "han", "sure", "confirm", "हाँ", "हां"],
                en: "Okay, confirmed.",
                hi: "ठीक है, पुष्टि हो गई।",
                action: KioskAction::Confirm { answer: Answer::Yes },
            },
            Category {
                keywords: &["no", "nahi", "nahin", "cancel", "नहीं"],
                en: "Okay, cancelled.",
                hi: "ठीक है, रद्द कर दिया।",
                action: KioskAction::Confirm { answer: Answer::No },
            },
            Category {
                keywords: &["status", "track", "स्थिति"],
                en: "Opening complaint status.",
                hi: "शिकायत की स्थिति खोल रहा हूँ।",
                action: navigate(Screen::ComplaintStatus),
            },
            Category {
                keywords: &["complaint", "problem", "issue", "shikayat", "शिकायत", "समस्या"],
                en: "Opening the complaint form.",
                hi: "शिकायत फ़ॉर्म खोल रहा हूँ।",
                action: navigate(Screen::Complaint),
            },
            Category {
                keywords: &["electricity", "bijli", "power", "light", "बिजली"],
                en: "Opening the electricity bill.",
                hi: "बिजली बिल खोल रहा हूँ।",
                action: navigate(Screen::ElectricityBill),
            },
            Category {
                keywords: &["water", "pani", "पानी"],
                en: "Opening the water bill.",
                hi: "पानी का बिल खोल रहा हूँ।",
                action: navigate(Screen::WaterBill),
            },
            Category {
                keywords: &["gas", "cylinder", "गैस"],
                en: "Opening the gas bill.",
                hi: "गैस बिल खोल रहा हूँ।",
                action: navigate(Screen::GasBill),
            },
            Category {
                keywords: &["property", "house tax", "संपत्ति"],
                en: "Opening property tax.",
                hi: "संपत्ति कर खोल रहा हूँ।",
                action: navigate(Screen::PropertyTax),
            },
            Category {
                keywords: &["bill", "pay", "payment", "बिल", "भुगतान"],
                en: "Which bill would you like to pay: electricity, water or gas?",
                hi: "आप कौन सा बिल भरना चाहते हैं: बिजली, पानी या गैस?",
                action: KioskAction::None,
            },
            Category {
                keywords: &["help", "madad", "मदद"],
                en: "I can help with electricity, water and gas bills, property tax, and complaints.",
                hi: "मैं बिजली, पानी और गैस बिल, संपत्ति कर और शिकायतों में मदद कर सकता हूँ।",
                action: KioskAction::None,
            },
        ];
        Self { categories }
    }

    /// Reply for `transcript`, falling back to a generic offline message.
    #[must_use]
    pub fn infer(&self, transcript: &str, language: Language) -> (String, KioskAction) {
        let normalized = text::normalize(transcript);
        let category = self.categories.iter().find(|c| {
            c.keywords
                .iter()
                .any(|keyword| text::contains_phrase(&normalized, keyword))
        });

        match category {
            Some(category) => {
                let reply = match language {
                    Language::En => category.en,
                    Language::Hi => category.hi,
                };
                (reply.to_string(), category.action.clone())
            }
            None => (
                Phrasebook::new(language).offline_fallback().to_string(),
                KioskAction::None,
            ),
        }
    }
}
