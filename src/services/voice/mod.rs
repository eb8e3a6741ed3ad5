//! Voice control for the exam-taking page.

mod session;

pub(crate) use session::{TranscriptOutcome, VoiceSession, VoiceSessions, Viewport};

use serde::Serialize;

use crate::models::Letter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub(crate) enum VoiceCommand {
    SelectOption(Letter),
    Navigate(Direction),
    Clear,
    Submit,
    QueryTime,
    Unknown(String),
}

impl VoiceCommand {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::SelectOption(_) => "select_option",
            Self::Navigate(_) => "navigate",
            Self::Clear => "clear",
            Self::Submit => "submit",
            Self::QueryTime => "query_time",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Whether the user should hear/see feedback for this command. Short
    /// unrecognised fragments are usually interim transcription noise.
    pub(crate) fn should_announce(&self, min_chars: usize) -> bool {
        match self {
            Self::Unknown(raw) => raw.chars().count() >= min_chars,
            _ => true,
        }
    }
}

/// Maps a transcript to a command. Matching is substring based on the
/// lower-cased text; the first rule that matches wins.
pub(crate) fn interpret(transcript: &str) -> VoiceCommand {
    let text = transcript.trim().to_lowercase();

    if let Some(letter) = option_letter(&text) {
        return VoiceCommand::SelectOption(letter);
    }
    if text.contains("next") {
        return VoiceCommand::Navigate(Direction::Next);
    }
    if text.contains("previous") || text.contains("back") {
        return VoiceCommand::Navigate(Direction::Previous);
    }
    if text.contains("clear") {
        return VoiceCommand::Clear;
    }
    if text.contains("submit") || text.contains("finish") {
        return VoiceCommand::Submit;
    }
    if text.contains("time") {
        return VoiceCommand::QueryTime;
    }

    VoiceCommand::Unknown(transcript.trim().to_string())
}

fn option_letter(text: &str) -> Option<Letter> {
    for letter in Letter::ALL {
        let lower = letter.to_string().to_lowercase();
        if contains_word_pair(text, "option", &lower) {
            return Some(letter);
        }
    }

    let last_word = text.split_whitespace().last()?;
    let bare = last_word.trim_matches(|c: char| !c.is_alphanumeric());
    Letter::parse(bare).filter(|_| bare.len() == 1)
}

/// `option b` as two consecutive words, ignoring trailing punctuation.
fn contains_word_pair(text: &str, first: &str, second: &str) -> bool {
    let words: Vec<&str> = text
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .collect();
    words.windows(2).any(|pair| pair[0] == first && pair[1] == second)
}
