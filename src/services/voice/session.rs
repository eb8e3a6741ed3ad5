use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{interpret, Direction, VoiceCommand};
use crate::models::{Letter, Timestamp};

/// Vertical position of a question card relative to the top of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub(crate) struct QuestionPosition {
    pub(crate) top: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Viewport {
    pub(crate) height: f64,
    #[serde(default)]
    pub(crate) questions: Vec<QuestionPosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum VoiceAction {
    Select { question_index: usize, option: Letter },
    ScrollTo { question_index: usize },
    Clear { question_index: usize },
    Submit,
    AnnounceTime { remaining_seconds: Option<i64> },
    NotRecognised,
    Ignored { reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TranscriptOutcome {
    pub(crate) command: VoiceCommand,
    pub(crate) action: VoiceAction,
    pub(crate) announce: bool,
}

/// State of one live exam-taking page driven by speech.
#[derive(Debug, Clone)]
pub(crate) struct VoiceSession {
    question_count: usize,
    ends_at: Option<Timestamp>,
    min_feedback_chars: usize,
    last_transcript: Option<String>,
    answers: BTreeMap<usize, Letter>,
    submitted: bool,
}

impl VoiceSession {
    pub(crate) fn new(
        question_count: usize,
        ends_at: Option<Timestamp>,
        min_feedback_chars: usize,
    ) -> Self {
        Self {
            question_count,
            ends_at,
            min_feedback_chars,
            last_transcript: None,
            answers: BTreeMap::new(),
            submitted: false,
        }
    }

    pub(crate) fn answers(&self) -> &BTreeMap<usize, Letter> {
        &self.answers
    }

    pub(crate) fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Interprets and applies a transcript. Returns `None` when the transcript
    /// repeats the previous one, which continuous recognition does while a
    /// phrase stabilises.
    pub(crate) fn handle(
        &mut self,
        transcript: &str,
        viewport: &Viewport,
        now: Timestamp,
    ) -> Option<TranscriptOutcome> {
        let normalized = transcript.trim().to_lowercase();
        if normalized.is_empty() || self.last_transcript.as_deref() == Some(normalized.as_str()) {
            return None;
        }
        self.last_transcript = Some(normalized);

        let command = interpret(transcript);
        let announce = command.should_announce(self.min_feedback_chars);
        let action = self.apply(&command, viewport, now);

        metrics::counter!("voice_commands_total", "kind" => command.kind()).increment(1);
        tracing::debug!(kind = command.kind(), ?action, "Voice command dispatched");

        Some(TranscriptOutcome { command, action, announce })
    }

    fn apply(&mut self, command: &VoiceCommand, viewport: &Viewport, now: Timestamp) -> VoiceAction {
        if self.submitted {
            return VoiceAction::Ignored { reason: "exam already submitted" };
        }
        if self.question_count == 0 && !matches!(command, VoiceCommand::QueryTime) {
            return VoiceAction::Ignored { reason: "exam has no questions" };
        }

        match command {
            VoiceCommand::SelectOption(option) => {
                let question_index = self.current_question(viewport);
                self.answers.insert(question_index, *option);
                VoiceAction::Select { question_index, option: *option }
            }
            VoiceCommand::Navigate(direction) => {
                let last = self.question_count - 1;
                let base = self.current_question(viewport);
                let question_index = match direction {
                    Direction::Next => (base + 1).min(last),
                    Direction::Previous => base.saturating_sub(1),
                };
                VoiceAction::ScrollTo { question_index }
            }
            VoiceCommand::Clear => {
                let question_index = self.current_question(viewport);
                self.answers.remove(&question_index);
                VoiceAction::Clear { question_index }
            }
            VoiceCommand::Submit => {
                self.submitted = true;
                VoiceAction::Submit
            }
            VoiceCommand::QueryTime => VoiceAction::AnnounceTime {
                remaining_seconds: self.ends_at.map(|end| (end - now).max(0)),
            },
            VoiceCommand::Unknown(_) => VoiceAction::NotRecognised,
        }
    }

    /// The question a spoken answer applies to: the first card whose top
    /// edge sits in the upper half of the viewport, else the first unanswered
    /// question, else the first question.
    pub(crate) fn current_question(&self, viewport: &Viewport) -> usize {
        let half = viewport.height / 2.0;
        let visible = viewport
            .questions
            .iter()
            .take(self.question_count)
            .position(|question| question.top >= 0.0 && question.top < half);
        if let Some(index) = visible {
            return index;
        }

        (0..self.question_count).find(|index| !self.answers.contains_key(index)).unwrap_or(0)
    }
}

struct SessionEntry {
    session: Arc<Mutex<VoiceSession>>,
    last_used: Instant,
}

/// Live voice sessions keyed by id. A session nobody touched for `idle_ttl`
/// is dropped on the next access, closed or not.
pub(crate) struct VoiceSessions {
    idle_ttl: Duration,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl VoiceSessions {
    pub(crate) fn new(idle_ttl: Duration) -> Self {
        Self { idle_ttl, sessions: Mutex::new(HashMap::new()) }
    }

    pub(crate) async fn open(&self, session: VoiceSession) -> Uuid {
        let id = Uuid::new_v4();
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions, now);
        let session = Arc::new(Mutex::new(session));
        sessions.insert(id, SessionEntry { session, last_used: now });
        id
    }

    pub(crate) async fn get(&self, id: &Uuid) -> Option<Arc<Mutex<VoiceSession>>> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions, now);
        sessions.get_mut(id).map(|entry| {
            entry.last_used = now;
            Arc::clone(&entry.session)
        })
    }

    pub(crate) async fn close(&self, id: &Uuid) -> bool {
        self.sessions.lock().await.remove(id).is_some()
    }

    fn evict_idle(&self, sessions: &mut HashMap<Uuid, SessionEntry>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_used) < self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            metrics::counter!("voice_sessions_evicted_total").increment(evicted as u64);
            tracing::debug!(evicted, "Evicted idle voice sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(tops: &[f64]) -> Viewport {
        Viewport {
            height: 800.0,
            questions: tops.iter().map(|top| QuestionPosition { top: *top }).collect(),
        }
    }

    #[test]
    fn selects_first_question_in_upper_half() {
        let mut session = VoiceSession::new(3, None, 3);
        let outcome = session.handle("option c", &viewport(&[-600.0, 120.0, 500.0]), 0).unwrap();

        assert_eq!(outcome.action, VoiceAction::Select { question_index: 1, option: Letter::C });
        assert_eq!(session.answers().get(&1), Some(&Letter::C));
    }

    #[test]
    fn falls_back_to_first_unanswered_question() {
        let mut session = VoiceSession::new(3, None, 3);
        session.handle("option a", &viewport(&[10.0, 900.0, 1_800.0]), 0);

        // Nothing in the upper half: question 0 is answered, so 1 is next.
        let outcome = session.handle("option b", &viewport(&[-900.0, 450.0, 1_300.0]), 0).unwrap();

        assert_eq!(outcome.action, VoiceAction::Select { question_index: 1, option: Letter::B });
    }

    #[test]
    fn empty_viewport_moves_on_to_next_unanswered_question() {
        let mut session = VoiceSession::new(3, None, 3);
        session.handle("option a", &viewport(&[0.0, 900.0, 1_800.0]), 0);

        let outcome = session.handle("option b", &viewport(&[]), 0).unwrap();

        assert_eq!(outcome.action, VoiceAction::Select { question_index: 1, option: Letter::B });
        assert_eq!(session.answers().get(&0), Some(&Letter::A));
        assert_eq!(session.answers().get(&1), Some(&Letter::B));
    }

    #[test]
    fn falls_back_to_first_question_when_all_answered() {
        let mut session = VoiceSession::new(2, None, 3);
        session.handle("option a", &viewport(&[0.0, 500.0]), 0);
        session.handle("option b", &viewport(&[-500.0, 0.0]), 0);

        let outcome = session.handle("option d", &viewport(&[-900.0, -100.0]), 0).unwrap();

        assert_eq!(outcome.action, VoiceAction::Select { question_index: 0, option: Letter::D });
    }

    #[test]
    fn identical_consecutive_transcripts_are_skipped() {
        let mut session = VoiceSession::new(2, None, 3);
        let view = viewport(&[0.0, 500.0]);

        assert!(session.handle("next", &view, 0).is_some());
        assert!(session.handle(" Next ", &view, 0).is_none());
        assert!(session.handle("option a", &view, 0).is_some());
        assert!(session.handle("next", &view, 0).is_some());
    }

    #[test]
    fn navigation_is_clamped_to_question_range() {
        let mut session = VoiceSession::new(2, None, 3);

        let back = session.handle("go back", &viewport(&[0.0, 500.0]), 0).unwrap();
        let forward = session.handle("next question", &viewport(&[-500.0, 0.0]), 0).unwrap();

        assert_eq!(back.action, VoiceAction::ScrollTo { question_index: 0 });
        assert_eq!(forward.action, VoiceAction::ScrollTo { question_index: 1 });
    }

    #[test]
    fn clear_removes_answer_for_current_question() {
        let mut session = VoiceSession::new(2, None, 3);
        let view = viewport(&[0.0, 500.0]);
        session.handle("option b", &view, 0);

        let outcome = session.handle("clear", &view, 0).unwrap();

        assert_eq!(outcome.action, VoiceAction::Clear { question_index: 0 });
        assert!(session.answers().is_empty());
    }

    #[test]
    fn submit_locks_the_session() {
        let mut session = VoiceSession::new(1, None, 3);
        let view = viewport(&[0.0]);

        let submitted = session.handle("submit", &view, 0).unwrap();
        let after = session.handle("option a", &view, 0).unwrap();

        assert_eq!(submitted.action, VoiceAction::Submit);
        assert!(session.is_submitted());
        assert!(matches!(after.action, VoiceAction::Ignored { .. }));
    }

    #[test]
    fn time_query_reports_remaining_seconds() {
        let mut session = VoiceSession::new(1, Some(1_500), 3);
        let outcome = session.handle("what time is it", &viewport(&[]), 1_200).unwrap();

        assert_eq!(outcome.action, VoiceAction::AnnounceTime { remaining_seconds: Some(300) });
    }

    #[test]
    fn short_unknown_transcripts_are_silent() {
        let mut session = VoiceSession::new(1, None, 3);
        let outcome = session.handle("uh", &viewport(&[0.0]), 0).unwrap();

        assert_eq!(outcome.action, VoiceAction::NotRecognised);
        assert!(!outcome.announce);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_and_active_ones_kept() {
        let sessions = VoiceSessions::new(Duration::from_millis(200));
        let active = sessions.open(VoiceSession::new(1, None, 3)).await;
        let abandoned = sessions.open(VoiceSession::new(1, None, 3)).await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(sessions.get(&active).await.is_some());
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(sessions.get(&active).await.is_some());
        assert!(sessions.get(&abandoned).await.is_none());
        assert!(!sessions.close(&abandoned).await);
    }

    #[tokio::test]
    async fn sessions_can_be_opened_and_closed() {
        let sessions = VoiceSessions::new(Duration::from_secs(60));
        let id = sessions.open(VoiceSession::new(1, None, 3)).await;

        assert!(sessions.get(&id).await.is_some());
        assert!(sessions.close(&id).await);
        assert!(sessions.get(&id).await.is_none());
    }
}
