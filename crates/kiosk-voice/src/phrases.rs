//! Fixed phrases spoken by the controller itself.

use kiosk_core::Language;

const REPROMPTS_EN: &[&str] = &[
    "I'm still listening. How can I help you?",
    "You can say things like electricity bill, water bill, or file a complaint.",
    "Are you still there? Say stop when you are done.",
];

const REPROMPTS_HI: &[&str] = &[
    "मैं अभी भी सुन रहा हूँ। मैं आपकी क्या मदद कर सकता हूँ?",
    "आप बिजली बिल, पानी बिल या शिकायत दर्ज करें जैसा कुछ बोल सकते हैं।",
    "क्या आप अभी भी वहाँ हैं? काम पूरा होने पर रुको बोलें।",
];

/// Language-specific phrases for re-prompts and failure replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phrasebook {
    language: Language,
}

impl Phrasebook {
    #[must_use]
    pub const fn new(language: Language) -> Self {
        Self { language }
    }

    #[must_use]
    pub fn for_tag(tag: &str) -> Self {
        Self::new(Language::from_tag(tag))
    }

    #[must_use]
    pub const fn language(self) -> Language {
        self.language
    }

    /// Re-prompt for the `index`-th silence; later prompts reuse the last one.
    #[must_use]
    pub fn reprompt(self, index: u32) -> &'static str {
        let prompts = match self.language {
            Language::En => REPROMPTS_EN,
            Language::Hi => REPROMPTS_HI,
        };
        let index = usize::try_from(index).unwrap_or(usize::MAX);
        prompts
            .get(index)
            .or_else(|| prompts.last())
            .copied()
            .unwrap_or_default()
    }

    /// Spoken when resolving a turn failed outright.
    #[must_use]
    pub const fn apology(self) -> &'static str {
        match self.language {
            Language::En => "Sorry, something went wrong on my side. Please say that again.",
            Language::Hi => "क्षमा करें, कुछ गड़बड़ हो गई। कृपया फिर से बोलें।",
        }
    }

    /// Offline reply when no keyword category matched.
    #[must_use]
    pub const fn offline_fallback(self) -> &'static str {
        match self.language {
            Language::En => {
                "I'm working offline right now. You can say electricity bill, water bill, gas bill, property tax, or complaint."
            }
            Language::Hi => {
                "अभी मैं ऑफ़लाइन हूँ। आप बिजली बिल, पानी बिल, गैस बिल, संपत्ति कर या शिकायत बोल सकते हैं।"
            }
        }
    }
}
