use std::collections::BTreeMap;
use std::fmt;

use crate::quiz::Course;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QuizError {
    #[error("the quiz has not been started yet")]
    NotActive,
}

/// Quiz mode flag plus the answer picked for each question index.
///
/// Quiz mode only ever goes from inactive to active. Answers are kept by index,
/// so they are not tied to a particular course.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizSession {
    active: bool,
    selected_answer: BTreeMap<usize, String>,
}

impl QuizSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Records `option` for question `index`, replacing any earlier pick.
    pub fn select(&mut self, index: usize, option: impl Into<String>) -> Result<(), QuizError> {
        if !self.active {
            return Err(QuizError::NotActive);
        }
        self.selected_answer.insert(index, option.into());
        Ok(())
    }

    pub fn selected(&self, index: usize) -> Option<&str> {
        self.selected_answer.get(&index).map(String::as_str)
    }

    pub fn answered(&self) -> usize {
        self.selected_answer.len()
    }

    pub fn submit(&self, course: &Course) -> Result<Score, QuizError> {
        if !self.active {
            return Err(QuizError::NotActive);
        }

        let correct = course
            .questions
            .iter()
            .enumerate()
            .filter(|(i, question)| {
                self.selected(*i)
                    .map_or(false, |answer| question.is_correct(answer))
            })
            .count();

        Ok(Score {
            correct,
            total: course.questions.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} out of {} correct", self.correct, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{Catalog, Question};

    fn productivity() -> Course {
        Catalog::builtin()
            .unwrap()
            .get("Productivity Software")
            .unwrap()
            .clone()
    }

    fn active_session(answers: &[&str]) -> QuizSession {
        let mut session = QuizSession::new();
        session.activate();
        for (i, answer) in answers.iter().enumerate() {
            session.select(i, *answer).unwrap();
        }
        session
    }

    #[test]
    fn all_correct_answers_score_full_marks() {
        let session = active_session(&["Word", "Excel", "PowerPoint"]);
        let score = session.submit(&productivity()).unwrap();
        assert_eq!(score.to_string(), "3 out of 3 correct");
    }

    #[test]
    fn one_wrong_answer_costs_one_point() {
        let session = active_session(&["Excel", "Excel", "PowerPoint"]);
        let score = session.submit(&productivity()).unwrap();
        assert_eq!(score.to_string(), "2 out of 3 correct");
    }

    #[test]
    fn score_counts_exactly_the_matching_selections() {
        let course = Course::new(
            "Numbers",
            "Teach numbers",
            (0..5)
                .map(|i| Question::new(format!("Pick {i}"), ["right", "wrong"], "right").unwrap())
                .collect(),
        );

        for k in 0..=course.questions.len() {
            let mut session = QuizSession::new();
            session.activate();
            for i in 0..course.questions.len() {
                let answer = if i < k { "right" } else { "wrong" };
                session.select(i, answer).unwrap();
            }
            assert_eq!(
                session.submit(&course).unwrap(),
                Score {
                    correct: k,
                    total: 5
                }
            );
        }
    }

    #[test]
    fn unanswered_questions_count_as_wrong() {
        let session = active_session(&[]);
        let score = session.submit(&productivity()).unwrap();
        assert_eq!(score, Score { correct: 0, total: 3 });

        let mut partial = QuizSession::new();
        partial.activate();
        partial.select(2, "PowerPoint").unwrap();
        assert_eq!(partial.submit(&productivity()).unwrap().correct, 1);
    }

    #[test]
    fn resubmitting_gives_the_same_score() {
        let session = active_session(&["Word", "Word", "PowerPoint"]);
        let course = productivity();
        let first = session.submit(&course).unwrap();
        let second = session.submit(&course).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reselecting_overwrites_the_previous_answer() {
        let mut session = active_session(&["Word", "Word", "PowerPoint"]);
        let course = productivity();
        assert_eq!(session.submit(&course).unwrap().correct, 2);

        session.select(1, "PowerPoint").unwrap();
        session.select(1, "Excel").unwrap();
        assert_eq!(session.selected(1), Some("Excel"));
        assert_eq!(session.answered(), 3);
        assert_eq!(session.submit(&course).unwrap().correct, 3);
    }

    #[test]
    fn inactive_session_refuses_selection_and_submission() {
        let mut session = QuizSession::new();
        assert!(!session.is_active());
        assert_eq!(session.select(0, "Word"), Err(QuizError::NotActive));
        assert_eq!(session.submit(&productivity()), Err(QuizError::NotActive));

        session.activate();
        session.activate();
        assert!(session.is_active());
        assert!(session.select(0, "Word").is_ok());
    }

    #[test]
    fn answers_survive_a_course_change() {
        let catalog = Catalog::builtin().unwrap();
        let session = active_session(&["Restart it"]);
        let troubleshooting = catalog.get("Basic Troubleshooting").unwrap();
        assert_eq!(session.submit(troubleshooting).unwrap().correct, 1);
        assert_eq!(session.submit(&productivity()).unwrap().correct, 0);
    }
}
