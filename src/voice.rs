//! Live voice conversation coordinator.
//!
//! ARCHITECTURE
//! ============
//! A pure state machine between a speech recognizer (mic) and a speech
//! synthesizer (speaker). The caller feeds recognizer and synthesizer events
//! plus a clock, and executes the returned [`VoiceAction`]s. No I/O and no
//! timers live here: [`VoiceCoordinator::poll`] fires any deadline that has
//! passed.
//!
//! ```text
//!   Idle ──start_live──▶ Listening ──silence──▶ Processing ──reply──▶ Speaking
//!                           ▲                      │ empty/failed        │ done
//!                           └──── settle delay ── Settling ◀─────────────┘
//! ```
//!
//! The mic is never open while a reply is being generated or spoken, so the
//! assistant cannot hear itself.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Quiet period after a final transcript before it is submitted.
pub const SILENCE_DELAY: Duration = Duration::from_secs(2);
/// Pause after the assistant finishes before the mic reopens.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);
/// Mic restart delay after a `no-speech` recognizer error.
pub const NO_SPEECH_RESTART: Duration = Duration::from_millis(500);
/// Mic restart delay after the recognizer ends on its own.
pub const RECOGNIZER_END_RESTART: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Listening,
    Processing,
    Speaking,
    /// Reply finished; waiting out [`SETTLE_DELAY`] before listening again.
    Settling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicCommand {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceAction {
    Mic(MicCommand),
    /// Send this utterance to the chat assistant.
    Submit(String),
    /// Speak this (already cleaned) text.
    Speak(String),
    CancelSpeech,
}

#[derive(Debug)]
pub struct VoiceCoordinator {
    state: VoiceState,
    mic_on: bool,
    transcript: String,
    pending: Option<(String, Instant)>,
    settle_at: Option<Instant>,
    restart_at: Option<Instant>,
}

impl Default for VoiceCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: VoiceState::Idle,
            mic_on: false,
            transcript: String::new(),
            pending: None,
            settle_at: None,
            restart_at: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> VoiceState {
        self.state
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state != VoiceState::Idle
    }

    #[must_use]
    pub fn mic_active(&self) -> bool {
        self.mic_on
    }

    /// Text currently shown as "you are saying".
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Earliest pending deadline, for callers that sleep between polls.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.pending.as_ref().map(|(_, at)| *at), self.settle_at, self.restart_at]
            .into_iter()
            .flatten()
            .min()
    }

    pub fn start_live(&mut self) -> Vec<VoiceAction> {
        if self.state != VoiceState::Idle {
            return Vec::new();
        }
        debug!("voice: live session started");
        self.state = VoiceState::Listening;
        self.mic_on = true;
        vec![VoiceAction::Mic(MicCommand::Start)]
    }

    /// End the session from any state; a pending utterance is dropped.
    pub fn stop_live(&mut self) -> Vec<VoiceAction> {
        if self.state == VoiceState::Idle {
            return Vec::new();
        }
        debug!(from = ?self.state, "voice: live session stopped");
        *self = Self::new();
        vec![VoiceAction::Mic(MicCommand::Stop), VoiceAction::CancelSpeech]
    }

    /// Recognizer result. Ignored unless listening with the mic open.
    pub fn on_transcript(&mut self, text: &str, is_final: bool, now: Instant) {
        if self.state != VoiceState::Listening || !self.mic_on {
            return;
        }
        self.transcript = text.to_string();
        let spoken = text.trim();
        if is_final && !spoken.is_empty() {
            self.pending = Some((spoken.to_string(), now + SILENCE_DELAY));
        }
    }

    /// Fire every deadline at or before `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<VoiceAction> {
        match self.state {
            VoiceState::Listening => {
                if let Some((text, _)) = self.pending.take_if(|(_, at)| *at <= now) {
                    return self.enter_processing(text);
                }
                if !self.mic_on && self.restart_at.is_some_and(|at| at <= now) {
                    self.restart_at = None;
                    self.mic_on = true;
                    return vec![VoiceAction::Mic(MicCommand::Start)];
                }
                Vec::new()
            }
            VoiceState::Settling if self.settle_at.is_some_and(|at| at <= now) => {
                debug!("voice: settled, listening again");
                self.settle_at = None;
                self.state = VoiceState::Listening;
                self.mic_on = true;
                vec![VoiceAction::Mic(MicCommand::Start)]
            }
            _ => Vec::new(),
        }
    }

    fn enter_processing(&mut self, text: String) -> Vec<VoiceAction> {
        debug!(chars = text.len(), "voice: submitting utterance");
        self.state = VoiceState::Processing;
        self.clear_capture();
        vec![VoiceAction::Mic(MicCommand::Stop), VoiceAction::Submit(text)]
    }

    fn clear_capture(&mut self) {
        self.mic_on = false;
        self.transcript.clear();
        self.pending = None;
        self.restart_at = None;
    }

    fn settle(&mut self, now: Instant) {
        self.state = VoiceState::Settling;
        self.clear_capture();
        self.settle_at = Some(now + SETTLE_DELAY);
    }

    /// The assistant's full reply arrived.
    pub fn on_response_complete(&mut self, reply: &str, now: Instant) -> Vec<VoiceAction> {
        if self.state != VoiceState::Processing {
            return Vec::new();
        }
        let spoken = speech_text(reply);
        if spoken.is_empty() {
            self.settle(now);
            return Vec::new();
        }
        self.state = VoiceState::Speaking;
        self.clear_capture();
        vec![VoiceAction::Speak(spoken)]
    }

    pub fn on_response_failed(&mut self, now: Instant) {
        if self.state == VoiceState::Processing {
            warn!("voice: reply failed");
            self.settle(now);
        }
    }

    /// Synthesizer finished (or failed) speaking.
    pub fn on_speech_end(&mut self, now: Instant) {
        if self.state == VoiceState::Speaking {
            self.settle(now);
        }
    }

    /// Recognizer error by its browser name (`aborted`, `no-speech`, ...).
    pub fn on_recognition_error(&mut self, kind: &str, now: Instant) {
        match kind {
            "aborted" => {}
            "no-speech" if self.state == VoiceState::Listening => {
                self.mic_on = false;
                self.restart_at = Some(now + NO_SPEECH_RESTART);
            }
            "no-speech" => {}
            other => warn!(error = other, "voice: recognizer error"),
        }
    }

    /// Recognizer stopped on its own while listening.
    pub fn on_recognition_end(&mut self, now: Instant) {
        if self.state == VoiceState::Listening && self.mic_on {
            self.mic_on = false;
            self.restart_at = Some(now + RECOGNIZER_END_RESTART);
        }
    }
}

// =============================================================================
// SPEECH TEXT
// =============================================================================

const UNSPOKEN: &[char] = &[
    '🙏', '💰', '📱', '✅', '🚫', '👥', '🗓', '\u{FE0F}', '💬', '📊', '📋', '*', '#', '•',
];

/// Reply text as it should be read aloud: decorative symbols and markdown
/// markers removed, line breaks turned into sentence breaks, whitespace
/// collapsed.
#[must_use]
pub fn speech_text(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !UNSPOKEN.contains(c)).collect();

    let mut sentences = String::with_capacity(stripped.len());
    let mut in_newlines = false;
    for c in stripped.chars() {
        if c == '\n' {
            if !in_newlines {
                sentences.push_str(". ");
            }
            in_newlines = true;
        } else {
            in_newlines = false;
            sentences.push(c);
        }
    }

    sentences.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[path = "voice_test.rs"]
mod tests;
