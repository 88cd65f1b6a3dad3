//! Console stand-ins for platform speech and the kiosk UI.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kiosk_core::{
    ActionExecutor, Answer, CaptureError, KioskAction, PageContextProvider, RecognitionErrorKind,
    RecognitionSink, Screen, SessionStatus, SpeechCapture, SpeechSynthesizer, SynthesisError,
};
use kiosk_voice::VoiceEvent;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Confidence reported for typed utterances.
const TYPED_CONFIDENCE: f32 = 0.9;

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Plain text: a final recognition result.
    Speech(String),
    /// `~text`: an interim result.
    Interim(String),
    /// `!kill`: the recognizer dies without a word.
    KillRecognizer,
    /// `!end`: the recognizer reports a natural end.
    EndRecognizer,
    /// `!error <kind>`: the recognizer reports an error.
    RecognizerError(RecognitionErrorKind),
    Start,
    Stop,
    Status,
    Quit,
    Empty,
}

impl ConsoleInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if let Some(interim) = line.strip_prefix('~') {
            return Self::Interim(interim.trim().to_string());
        }
        match line {
            "!kill" => Self::KillRecognizer,
            "!end" => Self::EndRecognizer,
            "/start" => Self::Start,
            "/stop" => Self::Stop,
            "/status" => Self::Status,
            "/quit" | "/exit" => Self::Quit,
            _ => match line.strip_prefix("!error") {
                Some(kind) => Self::RecognizerError(parse_error_kind(kind.trim())),
                None => Self::Speech(line.to_string()),
            },
        }
    }
}

fn parse_error_kind(kind: &str) -> RecognitionErrorKind {
    match kind {
        "no-speech" => RecognitionErrorKind::NoSpeech,
        "aborted" => RecognitionErrorKind::Aborted,
        "audio-capture" => RecognitionErrorKind::AudioCapture,
        "network" => RecognitionErrorKind::Network,
        "not-allowed" => RecognitionErrorKind::NotAllowed,
        "service-not-available" => RecognitionErrorKind::ServiceUnavailable,
        other => RecognitionErrorKind::Other(other.to_string()),
    }
}

/// Recognition fed from the keyboard.
#[derive(Default)]
pub struct ConsoleCapture {
    sink: Mutex<Option<RecognitionSink>>,
    capturing: AtomicBool,
}

impl ConsoleCapture {
    /// Deliver recognizer-level input. Returns `false` for anything else.
    pub fn feed(&self, input: &ConsoleInput) -> bool {
        if !matches!(
            input,
            ConsoleInput::Speech(_)
                | ConsoleInput::Interim(_)
                | ConsoleInput::KillRecognizer
                | ConsoleInput::EndRecognizer
                | ConsoleInput::RecognizerError(_)
        ) {
            return false;
        }

        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(sink) = sink else {
            warn!("Recognition is not running; input ignored");
            return true;
        };

        match input {
            ConsoleInput::Speech(text) => sink.final_result(text.as_str(), Some(TYPED_CONFIDENCE)),
            ConsoleInput::Interim(text) => sink.partial(text.as_str(), Some(TYPED_CONFIDENCE)),
            ConsoleInput::KillRecognizer => {
                info!(generation = %sink.generation(), "Recognizer killed silently");
                self.capturing.store(false, Ordering::SeqCst);
            }
            ConsoleInput::EndRecognizer => {
                self.capturing.store(false, Ordering::SeqCst);
                sink.end();
            }
            ConsoleInput::RecognizerError(kind) => {
                self.capturing.store(false, Ordering::SeqCst);
                sink.error(kind.clone());
            }
            _ => {}
        }
        true
    }
}

impl SpeechCapture for ConsoleCapture {
    fn start(&self, language: &str, sink: RecognitionSink) -> Result<(), CaptureError> {
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }
        debug!(language, generation = %sink.generation(), "Console capture started");
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        if self.capturing.swap(false, Ordering::SeqCst) {
            let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner).clone();
            if let Some(sink) = sink {
                sink.error(RecognitionErrorKind::Aborted);
            }
        }
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

/// Prints replies and takes roughly as long as saying them would.
pub struct ConsoleSynthesizer {
    per_char: Duration,
}

impl ConsoleSynthesizer {
    pub const fn new(per_char: Duration) -> Self {
        Self { per_char }
    }
}

impl Default for ConsoleSynthesizer {
    fn default() -> Self {
        Self::new(Duration::from_millis(40))
    }
}

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    async fn speak(&self, text: &str, language: &str) -> Result<(), SynthesisError> {
        println!("🔊 [{language}] {text}");
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        tokio::time::sleep(self.per_char.saturating_mul(chars)).await;
        Ok(())
    }

    fn cancel(&self) {
        println!("🔇 (playback stopped)");
    }
}

/// The kiosk screen, driven by dispatched actions.
pub struct ConsoleHost {
    screens: Mutex<Vec<Screen>>,
}

impl ConsoleHost {
    pub fn new(initial: Screen) -> Self {
        Self {
            screens: Mutex::new(vec![initial]),
        }
    }

    pub fn screen(&self) -> Screen {
        self.screens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
            .unwrap_or(Screen::Home)
    }
}

impl ActionExecutor for ConsoleHost {
    fn execute(&self, action: &KioskAction) {
        let mut screens = self.screens.lock().unwrap_or_else(PoisonError::into_inner);
        match action {
            KioskAction::Navigate { screen } => {
                println!("🖥  → {screen:?}");
                screens.push(*screen);
            }
            KioskAction::Confirm { answer } => match answer {
                Answer::Yes => println!("🖥  confirmed"),
                Answer::No => println!("🖥  declined"),
            },
            KioskAction::PaymentMethodSelected { method } => {
                println!("🖥  payment method: {method:?}");
                screens.push(Screen::Payment);
            }
            KioskAction::FetchRequested { consumer_id } => match consumer_id {
                Some(id) => println!("🖥  fetching bill for {id}"),
                None => println!("🖥  fetching bill"),
            },
            KioskAction::GoBack => {
                if screens.len() > 1 {
                    screens.pop();
                }
                println!("🖥  ← {:?}", screens.last().copied().unwrap_or(Screen::Home));
            }
            KioskAction::StopSession => println!("🖥  voice mode off"),
            KioskAction::None => {}
        }
    }
}

impl PageContextProvider for ConsoleHost {
    fn current_screen(&self) -> String {
        serde_json::to_value(self.screen())
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "home".to_string())
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "screen": self.current_screen(),
            "depth": self.screens.lock().unwrap_or_else(PoisonError::into_inner).len(),
        })
    }
}

/// One line describing an event, or `None` for events not worth printing.
pub fn render_event(event: &VoiceEvent) -> Option<String> {
    match event {
        VoiceEvent::StateChanged { status } => Some(match status {
            SessionStatus::Idle => "○ idle".to_string(),
            SessionStatus::Listening => "● listening".to_string(),
            SessionStatus::Processing => "◌ thinking".to_string(),
            SessionStatus::Speaking => "◉ speaking".to_string(),
        }),
        VoiceEvent::InterimTranscript { text } => Some(format!("  … {text}")),
        VoiceEvent::TranscriptCommitted { text } => Some(format!("🗣  {text}")),
        VoiceEvent::BargeIn { text } => Some(format!("✋ interrupted by \"{text}\"")),
        VoiceEvent::RePrompt { index } => Some(format!("⏰ re-prompt #{}", index + 1)),
        VoiceEvent::RecognitionStarted { generation } => Some(format!("🎙  recognizer {generation}")),
        VoiceEvent::ActionDispatched { action } => Some(format!("⚡ {}", action.label())),
        VoiceEvent::Deactivated => Some("voice session ended (/start to resume)".to_string()),
        VoiceEvent::ReplyStarted { .. } => None,
    }
}

/// Read lines on a dedicated thread. The channel closes on Ctrl-D or Ctrl-C.
pub fn spawn_line_reader() -> anyhow::Result<mpsc::UnboundedReceiver<String>> {
    let mut editor = DefaultEditor::new()?;
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        loop {
            match editor.readline("you> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read input");
                    break;
                }
            }
        }
    });

    Ok(rx)
}
