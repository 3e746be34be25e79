//! Multiple-choice quiz engine for a section's lessons, plus the in-memory
//! store that holds active quiz sessions between requests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::{HangulLesson, Section};

/// Pass mark in percent. score / total must reach this to pass.
pub const PASS_THRESHOLD: f64 = 80.0;

const DISTRACTORS_PER_QUESTION: usize = 3;

#[derive(Debug, Clone)]
pub struct QuizQuestion {
    pub lesson_id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct: String,
}

/// Client-facing view of a question. The correct answer stays server-side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizState {
    InProgress,
    ShowingResults,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub score: usize,
    pub total: usize,
    pub percentage: f64,
    pub passed: bool,
}

impl QuizResult {
    fn from_score(score: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            score as f64 / total as f64 * 100.0
        };
        Self {
            score,
            total,
            percentage,
            passed: percentage >= PASS_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AnswerOutcome {
    Next { question_index: usize },
    Finished(QuizResult),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("quiz session not found")]
    NotFound,
    #[error("quiz already finished")]
    AlreadyFinished,
}

#[derive(Debug)]
pub struct QuizSession {
    id: Uuid,
    user_id: String,
    section: Section,
    questions: Vec<QuizQuestion>,
    question_index: usize,
    score: usize,
    state: QuizState,
    last_activity: Instant,
}

impl QuizSession {
    /// Builds one question per lesson in `lessons` (the section-filtered,
    /// ordered list). Distractors are drawn from the other lessons of the
    /// same list without replacement; with fewer than three alternatives the
    /// option set simply shrinks.
    pub fn new<R: Rng + ?Sized>(
        user_id: &str,
        section: Section,
        lessons: &[&HangulLesson],
        rng: &mut R,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            section,
            questions: build_questions(lessons, rng),
            question_index: 0,
            score: 0,
            state: QuizState::InProgress,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn question_index(&self) -> usize {
        self.question_index
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    pub fn lesson_ids(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.lesson_id.clone()).collect()
    }

    pub fn question_view(&self, index: usize) -> Option<QuestionView> {
        self.questions.get(index).map(|question| QuestionView {
            index,
            total: self.questions.len(),
            prompt: question.prompt.clone(),
            options: question.options.clone(),
        })
    }

    pub fn current_view(&self) -> Option<QuestionView> {
        self.question_view(self.question_index)
    }

    /// Scores `selected` against the current question and advances. There is
    /// no confirm step: every answer moves the quiz forward, and the last
    /// answer produces the result.
    pub fn answer(&mut self, selected: &str) -> Result<AnswerOutcome, QuizError> {
        if self.state != QuizState::InProgress {
            return Err(QuizError::AlreadyFinished);
        }
        let Some(question) = self.questions.get(self.question_index) else {
            return Err(QuizError::AlreadyFinished);
        };

        let correct = selected == question.correct;
        // The final result must count the answer just given, so the new score
        // is computed inline and used directly rather than read back from the
        // stored counter after the update.
        let score_with_answer = self.score + usize::from(correct);
        self.score = score_with_answer;
        self.last_activity = Instant::now();

        if self.question_index + 1 < self.questions.len() {
            self.question_index += 1;
            Ok(AnswerOutcome::Next {
                question_index: self.question_index,
            })
        } else {
            self.state = QuizState::ShowingResults;
            Ok(AnswerOutcome::Finished(QuizResult::from_score(
                score_with_answer,
                self.questions.len(),
            )))
        }
    }

    /// Retry: back to question 0 with the score cleared. Questions are kept.
    pub fn reset(&mut self) {
        self.question_index = 0;
        self.score = 0;
        self.state = QuizState::InProgress;
        self.last_activity = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

fn build_questions<R: Rng + ?Sized>(
    lessons: &[&HangulLesson],
    rng: &mut R,
) -> Vec<QuizQuestion> {
    lessons
        .iter()
        .map(|lesson| {
            let pool: Vec<&str> = lessons
                .iter()
                .filter(|other| other.id != lesson.id)
                .map(|other| other.romanization.as_str())
                .collect();

            let mut options: Vec<String> = pool
                .choose_multiple(rng, DISTRACTORS_PER_QUESTION)
                .map(|s| s.to_string())
                .collect();
            options.push(lesson.romanization.clone());
            options.shuffle(rng);

            QuizQuestion {
                lesson_id: lesson.id.clone(),
                prompt: lesson.character.clone(),
                options,
                correct: lesson.romanization.clone(),
            }
        })
        .collect()
}

/// What a handler needs back from answering through the store.
#[derive(Debug, Clone)]
pub enum AnswerReply {
    Next(QuestionView),
    Finished {
        result: QuizResult,
        section: Section,
        lesson_ids: Vec<String>,
    },
}

/// Process-wide store of active quiz sessions. Sessions live until they are
/// dismissed, replaced, or swept after sitting idle.
#[derive(Default)]
pub struct QuizStore {
    sessions: RwLock<HashMap<Uuid, QuizSession>>,
}

impl QuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session, replacing any existing one for the same user and
    /// section. Starting over is also the retry-with-fresh-questions path.
    pub fn insert(&self, session: QuizSession) -> Uuid {
        let mut sessions = self.sessions.write();
        sessions.retain(|_, existing| {
            !(existing.user_id == session.user_id && existing.section == session.section)
        });
        let id = session.id;
        sessions.insert(id, session);
        id
    }

    pub fn answer(
        &self,
        id: Uuid,
        user_id: &str,
        selected: &str,
    ) -> Result<AnswerReply, QuizError> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&id).ok_or(QuizError::NotFound)?;
        if session.user_id != user_id {
            return Err(QuizError::NotFound);
        }

        match session.answer(selected)? {
            AnswerOutcome::Next { question_index } => {
                let view = session
                    .question_view(question_index)
                    .ok_or(QuizError::AlreadyFinished)?;
                Ok(AnswerReply::Next(view))
            }
            AnswerOutcome::Finished(result) => Ok(AnswerReply::Finished {
                result,
                section: session.section,
                lesson_ids: session.lesson_ids(),
            }),
        }
    }

    pub fn retry(&self, id: Uuid, user_id: &str) -> Result<QuestionView, QuizError> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&id).ok_or(QuizError::NotFound)?;
        if session.user_id != user_id {
            return Err(QuizError::NotFound);
        }
        session.reset();
        session.current_view().ok_or(QuizError::NotFound)
    }

    pub fn remove(&self, id: Uuid, user_id: &str) -> Result<(), QuizError> {
        let mut sessions = self.sessions.write();
        match sessions.get(&id) {
            Some(session) if session.user_id == user_id => {
                sessions.remove(&id);
                Ok(())
            }
            _ => Err(QuizError::NotFound),
        }
    }

    /// Drops sessions idle for longer than `max_idle`; returns how many.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.idle_for() <= max_idle);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lesson(id: &str, character: &str, romanization: &str) -> HangulLesson {
        HangulLesson {
            id: id.to_string(),
            character: character.to_string(),
            romanization: romanization.to_string(),
            description: String::new(),
            character_type: vec!["vowel".to_string()],
            order_index: 0,
            examples: serde_json::json!({}),
            image_url: None,
        }
    }

    fn five_lessons() -> Vec<HangulLesson> {
        vec![
            lesson("l1", "ㅏ", "a"),
            lesson("l2", "ㅓ", "eo"),
            lesson("l3", "ㅗ", "o"),
            lesson("l4", "ㅜ", "u"),
            lesson("l5", "ㅣ", "i"),
        ]
    }

    fn session_for(lessons: &[HangulLesson], seed: u64) -> QuizSession {
        let refs: Vec<&HangulLesson> = lessons.iter().collect();
        let mut rng = StdRng::seed_from_u64(seed);
        QuizSession::new("user-1", Section::Vowels, &refs, &mut rng)
    }

    #[test]
    fn test_one_question_per_lesson_with_four_options() {
        let lessons = five_lessons();
        let session = session_for(&lessons, 7);

        assert_eq!(session.total(), 5);
        for (i, question) in session.questions.iter().enumerate() {
            assert_eq!(question.lesson_id, lessons[i].id);
            assert_eq!(question.options.len(), 4);
            assert!(question.options.contains(&question.correct));
            // Distractors come from other lessons, never the quizzed one.
            assert_eq!(
                question
                    .options
                    .iter()
                    .filter(|o| *o == &question.correct)
                    .count(),
                1
            );
        }
    }

    #[test]
    fn test_small_section_shrinks_option_count() {
        let lessons = vec![lesson("l1", "ㅏ", "a"), lesson("l2", "ㅓ", "eo")];
        let session = session_for(&lessons, 3);

        for question in &session.questions {
            assert_eq!(question.options.len(), 2);
            assert!(question.options.contains(&question.correct));
        }
    }

    #[test]
    fn test_four_of_five_is_a_pass() {
        let lessons = five_lessons();
        let mut session = session_for(&lessons, 11);

        let answers: Vec<String> = session.questions.iter().map(|q| q.correct.clone()).collect();
        for answer in answers.iter().take(4) {
            match session.answer(answer).unwrap() {
                AnswerOutcome::Next { .. } => {}
                AnswerOutcome::Finished(_) => panic!("finished early"),
            }
        }
        // Miss the last one on purpose: 4/5 = 80% is still a pass.
        let outcome = session.answer("definitely wrong").unwrap();
        match outcome {
            AnswerOutcome::Finished(result) => {
                assert_eq!(result.score, 4);
                assert_eq!(result.total, 5);
                assert!((result.percentage - 80.0).abs() < f64::EPSILON);
                assert!(result.passed);
            }
            AnswerOutcome::Next { .. } => panic!("expected final result"),
        }
    }

    #[test]
    fn test_three_of_five_fails_and_retry_resets() {
        let lessons = five_lessons();
        let mut session = session_for(&lessons, 13);

        let answers: Vec<String> = session.questions.iter().map(|q| q.correct.clone()).collect();
        for answer in answers.iter().take(3) {
            session.answer(answer).unwrap();
        }
        session.answer("wrong").unwrap();
        let outcome = session.answer("wrong").unwrap();
        match outcome {
            AnswerOutcome::Finished(result) => {
                assert_eq!(result.score, 3);
                assert!((result.percentage - 60.0).abs() < f64::EPSILON);
                assert!(!result.passed);
            }
            AnswerOutcome::Next { .. } => panic!("expected final result"),
        }
        assert_eq!(session.state(), QuizState::ShowingResults);

        session.reset();
        assert_eq!(session.question_index(), 0);
        assert_eq!(session.score(), 0);
        assert_eq!(session.state(), QuizState::InProgress);
    }

    #[test]
    fn test_final_answer_counts_toward_result() {
        let lessons = five_lessons();
        let mut session = session_for(&lessons, 17);

        let answers: Vec<String> = session.questions.iter().map(|q| q.correct.clone()).collect();
        for answer in answers.iter().take(4) {
            session.answer(answer).unwrap();
        }
        // A perfect run: the last answer's point must appear in the result.
        match session.answer(&answers[4]).unwrap() {
            AnswerOutcome::Finished(result) => {
                assert_eq!(result.score, 5);
                assert!(result.passed);
            }
            AnswerOutcome::Next { .. } => panic!("expected final result"),
        }
    }

    #[test]
    fn test_answer_after_finish_is_rejected() {
        let lessons = vec![lesson("l1", "ㅏ", "a")];
        let mut session = session_for(&lessons, 19);
        session.answer("a").unwrap();
        assert_eq!(session.answer("a").unwrap_err(), QuizError::AlreadyFinished);
    }

    #[test]
    fn test_store_replaces_existing_session_for_user_and_section() {
        let lessons = five_lessons();
        let store = QuizStore::new();

        let first = store.insert(session_for(&lessons, 23));
        let second = store.insert(session_for(&lessons, 29));

        assert_ne!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.answer(first, "user-1", "a").unwrap_err(),
            QuizError::NotFound
        );
    }

    #[test]
    fn test_store_hides_sessions_from_other_users() {
        let lessons = five_lessons();
        let store = QuizStore::new();
        let id = store.insert(session_for(&lessons, 31));

        assert_eq!(
            store.answer(id, "someone-else", "a").unwrap_err(),
            QuizError::NotFound
        );
        assert_eq!(
            store.remove(id, "someone-else").unwrap_err(),
            QuizError::NotFound
        );
        assert!(store.remove(id, "user-1").is_ok());
    }

    #[test]
    fn test_sweep_drops_idle_sessions() {
        let lessons = five_lessons();
        let store = QuizStore::new();
        store.insert(session_for(&lessons, 37));

        assert_eq!(store.sweep_idle(Duration::from_secs(3600)), 0);
        assert_eq!(store.sweep_idle(Duration::ZERO), 1);
        assert!(store.is_empty());
    }
}
