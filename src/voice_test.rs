use super::*;

fn live() -> VoiceCoordinator {
    let mut voice = VoiceCoordinator::new();
    assert_eq!(voice.start_live(), vec![VoiceAction::Mic(MicCommand::Start)]);
    voice
}

fn assert_mic_guard(voice: &VoiceCoordinator) {
    if matches!(voice.state(), VoiceState::Processing | VoiceState::Speaking) {
        assert!(!voice.mic_active(), "mic open while {:?}", voice.state());
    }
}

#[test]
fn final_transcript_submits_after_silence() {
    let t0 = Instant::now();
    let mut voice = live();

    voice.on_transcript("when is", false, t0);
    assert_eq!(voice.transcript(), "when is");
    voice.on_transcript(" when is annadanam ", true, t0);

    assert!(voice.poll(t0 + Duration::from_millis(1999)).is_empty());
    let actions = voice.poll(t0 + SILENCE_DELAY);
    assert_eq!(
        actions,
        vec![VoiceAction::Mic(MicCommand::Stop), VoiceAction::Submit("when is annadanam".into())]
    );
    assert_eq!(voice.state(), VoiceState::Processing);
    assert!(!voice.mic_active());
    assert_eq!(voice.transcript(), "");
}

#[test]
fn later_final_replaces_pending_and_resets_timer() {
    let t0 = Instant::now();
    let mut voice = live();
    voice.on_transcript("first", true, t0);
    voice.on_transcript("second", true, t0 + Duration::from_secs(1));

    assert!(voice.poll(t0 + SILENCE_DELAY).is_empty());
    let actions = voice.poll(t0 + Duration::from_secs(3));
    assert_eq!(actions[1], VoiceAction::Submit("second".into()));
}

#[test]
fn blank_final_transcript_is_not_submitted() {
    let t0 = Instant::now();
    let mut voice = live();
    voice.on_transcript("   ", true, t0);
    assert!(voice.poll(t0 + Duration::from_secs(10)).is_empty());
    assert_eq!(voice.state(), VoiceState::Listening);
}

#[test]
fn full_turn_keeps_mic_closed_then_resumes_after_settle() {
    let t0 = Instant::now();
    let mut voice = live();
    voice.on_transcript("hello", true, t0);
    voice.poll(t0 + SILENCE_DELAY);
    assert_mic_guard(&voice);

    // Input while processing is ignored.
    voice.on_transcript("echo", true, t0 + SILENCE_DELAY);
    assert_eq!(voice.transcript(), "");

    let t1 = t0 + Duration::from_secs(5);
    let actions = voice.on_response_complete("🙏 **Swamiye** Saranam!\n\n• Annadanam", t1);
    assert_eq!(actions, vec![VoiceAction::Speak("Swamiye Saranam!. Annadanam".into())]);
    assert_eq!(voice.state(), VoiceState::Speaking);
    assert_mic_guard(&voice);

    let t2 = t1 + Duration::from_secs(4);
    voice.on_speech_end(t2);
    assert_eq!(voice.state(), VoiceState::Settling);
    assert!(!voice.mic_active());

    assert!(voice.poll(t2 + Duration::from_millis(1999)).is_empty());
    assert!(!voice.mic_active());
    assert_eq!(voice.poll(t2 + SETTLE_DELAY), vec![VoiceAction::Mic(MicCommand::Start)]);
    assert_eq!(voice.state(), VoiceState::Listening);
    assert!(voice.mic_active());
}

#[test]
fn empty_or_failed_reply_settles_without_speaking() {
    let t0 = Instant::now();
    let mut voice = live();
    voice.on_transcript("hi", true, t0);
    voice.poll(t0 + SILENCE_DELAY);
    assert!(voice.on_response_complete("🙏 **", t0 + SILENCE_DELAY).is_empty());
    assert_eq!(voice.state(), VoiceState::Settling);

    let mut voice = live();
    voice.on_transcript("hi", true, t0);
    voice.poll(t0 + SILENCE_DELAY);
    voice.on_response_failed(t0 + SILENCE_DELAY);
    assert_eq!(voice.state(), VoiceState::Settling);
    assert_eq!(voice.next_deadline(), Some(t0 + SILENCE_DELAY + SETTLE_DELAY));
}

#[test]
fn stop_live_drops_pending_utterance() {
    let t0 = Instant::now();
    let mut voice = live();
    voice.on_transcript("book a slot", true, t0);
    assert_eq!(
        voice.stop_live(),
        vec![VoiceAction::Mic(MicCommand::Stop), VoiceAction::CancelSpeech]
    );
    assert_eq!(voice.state(), VoiceState::Idle);
    assert!(voice.poll(t0 + Duration::from_secs(10)).is_empty());
    assert!(voice.stop_live().is_empty());
}

#[test]
fn settling_does_not_resume_after_stop() {
    let t0 = Instant::now();
    let mut voice = live();
    voice.on_transcript("hi", true, t0);
    voice.poll(t0 + SILENCE_DELAY);
    voice.on_response_failed(t0 + SILENCE_DELAY);
    voice.stop_live();
    assert!(voice.poll(t0 + Duration::from_secs(60)).is_empty());
    assert!(!voice.mic_active());
}

#[test]
fn aborted_is_ignored_and_no_speech_restarts() {
    let t0 = Instant::now();
    let mut voice = live();
    voice.on_recognition_error("aborted", t0);
    assert!(voice.mic_active());

    voice.on_recognition_error("no-speech", t0);
    assert!(!voice.mic_active());
    assert!(voice.poll(t0 + Duration::from_millis(499)).is_empty());
    assert_eq!(voice.poll(t0 + NO_SPEECH_RESTART), vec![VoiceAction::Mic(MicCommand::Start)]);
    assert!(voice.mic_active());
}

#[test]
fn no_speech_while_processing_does_not_open_mic() {
    let t0 = Instant::now();
    let mut voice = live();
    voice.on_transcript("hi", true, t0);
    voice.poll(t0 + SILENCE_DELAY);
    voice.on_recognition_error("no-speech", t0 + SILENCE_DELAY);
    assert!(voice.poll(t0 + Duration::from_secs(30)).is_empty());
    assert_mic_guard(&voice);
}

#[test]
fn recognizer_end_restarts_while_listening() {
    let t0 = Instant::now();
    let mut voice = live();
    voice.on_recognition_end(t0);
    assert!(!voice.mic_active());
    voice.on_transcript("ignored", true, t0);
    assert_eq!(voice.transcript(), "");
    assert_eq!(voice.poll(t0 + RECOGNIZER_END_RESTART), vec![VoiceAction::Mic(MicCommand::Start)]);
}

#[test]
fn speech_text_cleanup() {
    assert_eq!(speech_text("🙏 Swamiye Saranam Ayyappa!\n\nI'm here"), "Swamiye Saranam Ayyappa!. I'm here");
    assert_eq!(speech_text("• *Irumudi*\n• Ghee"), "Irumudi. Ghee");
    assert_eq!(speech_text("## Timings 🗓️  1 PM"), "Timings 1 PM");
    assert_eq!(speech_text("  \n "), ".");
    assert_eq!(speech_text(""), "");
}
