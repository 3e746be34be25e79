//! Property-Based Tests for Hangul Progression and Quiz Scoring
//!
//! Tests the following invariants:
//! - Section filtering partitions the catalog and preserves catalog order
//! - Resume index always lands on the first incomplete lesson
//! - The lesson pointer never leaves the bounds of the filtered list
//! - The consonant section unlocks exactly when every vowel is complete
//! - Quiz results count every answer and pass exactly at the 80% mark

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use hangeul_backend::hangul::progression::{
    classify, filter_by_section, first_incomplete_index, is_section_available, Advance,
    LessonPointer,
};
use hangeul_backend::hangul::quiz::{AnswerOutcome, QuizSession, QuizState, PASS_THRESHOLD};
use hangeul_backend::hangul::{HangulLesson, Section};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn lesson_with(index: usize, tags: Vec<String>) -> HangulLesson {
    HangulLesson {
        id: format!("lesson-{index}"),
        character: format!("c{index}"),
        romanization: format!("r{index}"),
        description: String::new(),
        character_type: tags,
        order_index: index as i32 + 1,
        examples: serde_json::json!({}),
        image_url: None,
    }
}

fn vowel_catalog(len: usize) -> Vec<HangulLesson> {
    (0..len)
        .map(|index| lesson_with(index, vec!["vowel".to_string(), "basic".to_string()]))
        .collect()
}

fn arb_tags() -> impl Strategy<Value = Vec<String>> {
    prop_oneof![
        Just(vec!["vowel".to_string(), "basic".to_string()]),
        Just(vec!["vowel".to_string(), "compound".to_string()]),
        Just(vec!["consonant".to_string(), "basic".to_string()]),
        Just(vec!["consonant".to_string(), "double".to_string()]),
    ]
}

fn arb_catalog() -> impl Strategy<Value = Vec<HangulLesson>> {
    prop::collection::vec(arb_tags(), 0..24).prop_map(|tag_sets| {
        tag_sets
            .into_iter()
            .enumerate()
            .map(|(index, tags)| lesson_with(index, tags))
            .collect()
    })
}

fn arb_catalog_with_completions() -> impl Strategy<Value = (Vec<HangulLesson>, HashSet<String>)> {
    arb_catalog()
        .prop_flat_map(|catalog| {
            let len = catalog.len();
            (Just(catalog), prop::collection::vec(any::<bool>(), len))
        })
        .prop_map(|(catalog, mask)| {
            let completed = catalog
                .iter()
                .zip(mask)
                .filter(|(_, done)| *done)
                .map(|(lesson, _)| lesson.id.clone())
                .collect();
            (catalog, completed)
        })
}

fn arb_quiz_case() -> impl Strategy<Value = (usize, Vec<bool>, u64)> {
    (1usize..=12).prop_flat_map(|len| {
        (
            Just(len),
            prop::collection::vec(any::<bool>(), len), // which answers are correct
            any::<u64>(),                              // question shuffle seed
        )
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// PBT-1: Filtering by section partitions the catalog
    #[test]
    fn filter_partitions_catalog(catalog in arb_catalog()) {
        let vowels = filter_by_section(&catalog, Section::Vowels);
        let consonants = filter_by_section(&catalog, Section::Consonants);

        prop_assert_eq!(vowels.len() + consonants.len(), catalog.len());
        for lesson in &vowels {
            prop_assert_eq!(classify(lesson), Section::Vowels);
        }
        for lesson in &consonants {
            prop_assert_eq!(classify(lesson), Section::Consonants);
        }
    }

    /// PBT-2: Filtering preserves the catalog order within each section
    #[test]
    fn filter_preserves_catalog_order(catalog in arb_catalog()) {
        for section in Section::ALL {
            let filtered = filter_by_section(&catalog, section);
            for pair in filtered.windows(2) {
                prop_assert!(pair[0].order_index < pair[1].order_index);
            }
        }
    }

    /// PBT-3: Resume index is in bounds and lands on the first gap
    #[test]
    fn resume_index_points_at_first_gap(
        (catalog, completed) in arb_catalog_with_completions(),
    ) {
        for section in Section::ALL {
            let filtered = filter_by_section(&catalog, section);
            let index = first_incomplete_index(&filtered, &completed);

            if filtered.is_empty() {
                prop_assert_eq!(index, 0);
                continue;
            }
            prop_assert!(index < filtered.len());

            let has_gap = filtered.iter().any(|lesson| !completed.contains(&lesson.id));
            if has_gap {
                prop_assert!(!completed.contains(&filtered[index].id));
                for lesson in &filtered[..index] {
                    prop_assert!(completed.contains(&lesson.id));
                }
            } else {
                prop_assert_eq!(index, 0);
            }
        }
    }

    /// PBT-4: Pointer walks never leave the bounds of the list
    #[test]
    fn pointer_walk_stays_in_bounds(
        len in 0usize..16,
        start in 0usize..32,
        moves in prop::collection::vec(any::<bool>(), 0..40),
    ) {
        let upper = len.saturating_sub(1);
        let mut pointer = LessonPointer::at(start, len);
        prop_assert!(pointer.index() <= upper);

        for forward in moves {
            if forward {
                match pointer.next() {
                    Advance::Moved(index) => {
                        prop_assert_eq!(index, pointer.index());
                        prop_assert!(index < len);
                    }
                    Advance::SectionComplete => {
                        prop_assert_eq!(pointer.index(), upper);
                    }
                }
            } else if !pointer.previous() {
                prop_assert_eq!(pointer.index(), 0);
            }
            prop_assert!(pointer.index() <= upper);
        }
    }

    /// PBT-5: Consonants unlock exactly when every vowel is complete
    #[test]
    fn consonant_gate_requires_every_vowel(
        (catalog, completed) in arb_catalog_with_completions(),
    ) {
        prop_assert!(is_section_available(Section::Vowels, &catalog, &completed));

        let vowels = filter_by_section(&catalog, Section::Vowels);
        let expected = !vowels.is_empty()
            && vowels.iter().all(|lesson| completed.contains(&lesson.id));
        prop_assert_eq!(
            is_section_available(Section::Consonants, &catalog, &completed),
            expected
        );
    }

    /// PBT-6: Final result counts exactly the correct answers
    #[test]
    fn quiz_score_matches_correct_answers((len, correct_mask, seed) in arb_quiz_case()) {
        let catalog = vowel_catalog(len);
        let refs: Vec<&HangulLesson> = catalog.iter().collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut session = QuizSession::new("pbt-user", Section::Vowels, &refs, &mut rng);

        prop_assert_eq!(session.total(), len);

        let by_id: HashMap<&str, &HangulLesson> = catalog
            .iter()
            .map(|lesson| (lesson.id.as_str(), lesson))
            .collect();
        let quizzed = session.lesson_ids();
        let expected_score = correct_mask.iter().filter(|correct| **correct).count();

        for (i, correct) in correct_mask.iter().enumerate() {
            let selected = if *correct {
                by_id[quizzed[i].as_str()].romanization.clone()
            } else {
                "not-an-option".to_string()
            };
            match session.answer(&selected).unwrap() {
                AnswerOutcome::Next { question_index } => {
                    prop_assert!(i + 1 < len);
                    prop_assert_eq!(question_index, i + 1);
                }
                AnswerOutcome::Finished(result) => {
                    prop_assert_eq!(i + 1, len);
                    prop_assert_eq!(result.score, expected_score);
                    prop_assert_eq!(result.total, len);
                    prop_assert!(result.percentage >= 0.0 && result.percentage <= 100.0);
                    prop_assert_eq!(result.passed, result.percentage >= PASS_THRESHOLD);
                }
            }
        }
    }

    /// PBT-7: Every question shows the right answer exactly once
    #[test]
    fn question_options_contain_answer_once((len, _mask, seed) in arb_quiz_case()) {
        let catalog = vowel_catalog(len);
        let refs: Vec<&HangulLesson> = catalog.iter().collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let session = QuizSession::new("pbt-user", Section::Vowels, &refs, &mut rng);

        let by_id: HashMap<&str, &HangulLesson> = catalog
            .iter()
            .map(|lesson| (lesson.id.as_str(), lesson))
            .collect();

        for (i, lesson_id) in session.lesson_ids().iter().enumerate() {
            let lesson = by_id[lesson_id.as_str()];
            let view = session.question_view(i).unwrap();

            prop_assert_eq!(view.index, i);
            prop_assert_eq!(view.total, len);
            prop_assert_eq!(&view.prompt, &lesson.character);
            // Three distractors plus the answer, fewer in tiny sections.
            prop_assert_eq!(view.options.len(), len.min(4));

            let unique: HashSet<&String> = view.options.iter().collect();
            prop_assert_eq!(unique.len(), view.options.len());
            prop_assert!(view.options.contains(&lesson.romanization));
        }
    }

    /// PBT-8: Retry rewinds to a clean slate and a perfect rerun passes
    #[test]
    fn retry_clears_previous_run((len, correct_mask, seed) in arb_quiz_case()) {
        let catalog = vowel_catalog(len);
        let refs: Vec<&HangulLesson> = catalog.iter().collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut session = QuizSession::new("pbt-user", Section::Vowels, &refs, &mut rng);

        let by_id: HashMap<&str, &HangulLesson> = catalog
            .iter()
            .map(|lesson| (lesson.id.as_str(), lesson))
            .collect();
        let quizzed = session.lesson_ids();

        for (i, correct) in correct_mask.iter().enumerate() {
            let selected = if *correct {
                by_id[quizzed[i].as_str()].romanization.clone()
            } else {
                "not-an-option".to_string()
            };
            session.answer(&selected).unwrap();
        }
        prop_assert_eq!(session.state(), QuizState::ShowingResults);

        session.reset();
        prop_assert_eq!(session.state(), QuizState::InProgress);
        prop_assert_eq!(session.question_index(), 0);
        prop_assert_eq!(session.score(), 0);

        let mut last = None;
        for lesson_id in &quizzed {
            let answer = by_id[lesson_id.as_str()].romanization.clone();
            last = Some(session.answer(&answer).unwrap());
        }
        match last {
            Some(AnswerOutcome::Finished(result)) => {
                prop_assert_eq!(result.score, len);
                prop_assert!(result.passed);
            }
            _ => prop_assert!(false, "perfect rerun must finish with a result"),
        }
    }
}

// ============================================================================
// Additional Unit Tests for Edge Cases
// ============================================================================

#[test]
fn empty_section_quiz_has_no_questions() {
    let mut rng = StdRng::seed_from_u64(0);
    let session = QuizSession::new("user", Section::Vowels, &[], &mut rng);
    assert_eq!(session.total(), 0);
    assert!(session.current_view().is_none());
}

#[test]
fn single_lesson_quiz_offers_only_the_answer() {
    let catalog = vowel_catalog(1);
    let refs: Vec<&HangulLesson> = catalog.iter().collect();
    let mut rng = StdRng::seed_from_u64(1);
    let session = QuizSession::new("user", Section::Vowels, &refs, &mut rng);

    let view = session.question_view(0).unwrap();
    assert_eq!(view.options, vec![catalog[0].romanization.clone()]);
}

#[test]
fn pointer_start_beyond_len_clamps_to_last() {
    let pointer = LessonPointer::at(usize::MAX, 5);
    assert_eq!(pointer.index(), 4);

    let empty = LessonPointer::at(usize::MAX, 0);
    assert_eq!(empty.index(), 0);
}

#[test]
fn exact_threshold_is_a_pass() {
    // 4 of 5 is exactly 80%.
    let catalog = vowel_catalog(5);
    let refs: Vec<&HangulLesson> = catalog.iter().collect();
    let mut rng = StdRng::seed_from_u64(2);
    let mut session = QuizSession::new("user", Section::Vowels, &refs, &mut rng);

    let by_id: HashMap<&str, &HangulLesson> = catalog
        .iter()
        .map(|lesson| (lesson.id.as_str(), lesson))
        .collect();
    let quizzed = session.lesson_ids();

    for lesson_id in quizzed.iter().take(4) {
        session
            .answer(&by_id[lesson_id.as_str()].romanization)
            .unwrap();
    }
    match session.answer("not-an-option").unwrap() {
        AnswerOutcome::Finished(result) => {
            assert_eq!(result.score, 4);
            assert!(result.passed);
        }
        AnswerOutcome::Next { .. } => panic!("expected the quiz to finish"),
    }
}
