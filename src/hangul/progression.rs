//! Section classification, filtering, progress and navigation for the
//! Hangul lesson flow. Everything here is pure so it can back both the
//! HTTP handlers and the quiz engine.

use std::collections::HashSet;

use super::{HangulLesson, Section, VOWEL_TAG};

/// Classifies a lesson from its type tags. Presence of the vowel tag wins,
/// anything else is a consonant lesson.
pub fn classify(lesson: &HangulLesson) -> Section {
    if lesson.character_type.iter().any(|tag| tag == VOWEL_TAG) {
        Section::Vowels
    } else {
        Section::Consonants
    }
}

/// Ordered sublist of `lessons` classified into `section`. Relative order of
/// the input is preserved.
pub fn filter_by_section(lessons: &[HangulLesson], section: Section) -> Vec<&HangulLesson> {
    lessons
        .iter()
        .filter(|lesson| classify(lesson) == section)
        .collect()
}

/// Index of the first lesson without a completion record, or 0 when the list
/// is empty or fully completed (resume-at-first-gap).
pub fn first_incomplete_index(lessons: &[&HangulLesson], completed: &HashSet<String>) -> usize {
    lessons
        .iter()
        .position(|lesson| !completed.contains(&lesson.id))
        .unwrap_or(0)
}

/// A section is available iff it has no prerequisite, or every lesson of the
/// prerequisite section has a completion record. An empty prerequisite
/// section never unlocks anything.
pub fn is_section_available(
    section: Section,
    lessons: &[HangulLesson],
    completed: &HashSet<String>,
) -> bool {
    let Some(prerequisite) = section.prerequisite() else {
        return true;
    };

    let required = filter_by_section(lessons, prerequisite);
    if required.is_empty() {
        return false;
    }
    required.iter().all(|lesson| completed.contains(&lesson.id))
}

/// Outcome of advancing the lesson pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Pointer moved to the given index.
    Moved(usize),
    /// Pointer was already on the last lesson; the pointer does not move and
    /// the caller treats the section as finished.
    SectionComplete,
}

/// Transient pointer into a section-filtered lesson list. Never persisted;
/// recomputed whenever the filter or completion data changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonPointer {
    index: usize,
    len: usize,
}

impl LessonPointer {
    /// Pointer positioned at the first incomplete lesson of `lessons`.
    pub fn resume(lessons: &[&HangulLesson], completed: &HashSet<String>) -> Self {
        Self::at(first_incomplete_index(lessons, completed), lessons.len())
    }

    /// Pointer at `index`, clamped into `[0, len - 1]`. A zero-length list
    /// pins the pointer at 0.
    pub fn at(index: usize, len: usize) -> Self {
        let index = if len == 0 { 0 } else { index.min(len - 1) };
        Self { index, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Advances by one. At the last lesson (or on an empty list) the pointer
    /// stays put and the section-complete signal is returned instead.
    pub fn next(&mut self) -> Advance {
        if self.index + 1 < self.len {
            self.index += 1;
            Advance::Moved(self.index)
        } else {
            Advance::SectionComplete
        }
    }

    /// Retreats by one. Returns false (and stays put) at index 0.
    pub fn previous(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }
}
