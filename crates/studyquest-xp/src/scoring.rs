//! Answer validation and scoring.
//!
//! Answers are matched to questions by position. Only multiple-choice
//! questions are auto-scored; a free-text answer is recorded but never
//! counts toward the score.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use studyquest_types::{Answer, Question, QuestionAnswerKind};

use crate::XpError;

/// A submitted answer sheet that does not fit the event's questions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerError {
    /// The event has no questions to answer.
    #[error("event has no questions")]
    NoQuestions,

    /// The answer sheet length differs from the question count.
    #[error("expected {expected} answers, got {actual}")]
    CountMismatch {
        /// Number of questions.
        expected: usize,
        /// Number of answers submitted.
        actual: usize,
    },

    /// A choice index points past the end of the options list.
    #[error("answer {position}: choice {choice} is out of range for {options} options")]
    ChoiceOutOfRange {
        /// 0-based answer position.
        position: usize,
        /// The submitted index.
        choice: u32,
        /// Number of options the question offers.
        options: usize,
    },

    /// A choice was submitted for a free-text question.
    #[error("answer {position}: free-text question cannot take a choice")]
    ChoiceForFreeText {
        /// 0-based answer position.
        position: usize,
    },

    /// Text was submitted for a multiple-choice question.
    #[error("answer {position}: multiple-choice question cannot take free text")]
    TextForChoice {
        /// 0-based answer position.
        position: usize,
    },
}

/// Check an answer sheet against the event's questions.
///
/// `questions` must already be in position order.
pub fn validate_answers(questions: &[Question], answers: &[Answer]) -> Result<(), AnswerError> {
    if questions.is_empty() {
        return Err(AnswerError::NoQuestions);
    }
    if questions.len() != answers.len() {
        return Err(AnswerError::CountMismatch {
            expected: questions.len(),
            actual: answers.len(),
        });
    }

    for (position, (question, answer)) in questions.iter().zip(answers).enumerate() {
        match (&question.answer, answer) {
            (_, Answer::Skipped)
            | (QuestionAnswerKind::FreeText, Answer::Text(_)) => {}
            (QuestionAnswerKind::MultipleChoice { options, .. }, Answer::Choice(choice)) => {
                let in_range = usize::try_from(*choice).is_ok_and(|idx| idx < options.len());
                if !in_range {
                    return Err(AnswerError::ChoiceOutOfRange {
                        position,
                        choice: *choice,
                        options: options.len(),
                    });
                }
            }
            (QuestionAnswerKind::FreeText, Answer::Choice(_)) => {
                return Err(AnswerError::ChoiceForFreeText { position });
            }
            (QuestionAnswerKind::MultipleChoice { .. }, Answer::Text(_)) => {
                return Err(AnswerError::TextForChoice { position });
            }
        }
    }

    Ok(())
}

/// Count the answers that hit their question's correct option.
pub fn score_answers(questions: &[Question], answers: &[Answer]) -> u32 {
    let correct = questions
        .iter()
        .zip(answers)
        .filter(|(question, answer)| match (&question.answer, answer) {
            (QuestionAnswerKind::MultipleChoice { correct_index, .. }, Answer::Choice(choice)) => {
                choice == correct_index
            }
            _ => false,
        })
        .count();
    u32::try_from(correct).unwrap_or(u32::MAX)
}

/// Convert a score into XP: `round(score / total_questions * xp_reward)`.
///
/// Rounds half away from zero, so 2.5 becomes 3.
pub fn xp_for_score(score: u32, total_questions: u32, xp_reward: i64) -> Result<i64, XpError> {
    if total_questions == 0 {
        return Err(XpError::NoQuestions);
    }
    if xp_reward < 0 {
        return Err(XpError::Negative {
            field: "xp_reward",
            value: xp_reward,
        });
    }

    Decimal::from(score)
        .checked_mul(Decimal::from(xp_reward))
        .and_then(|v| v.checked_div(Decimal::from(total_questions)))
        .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|v| v.to_i64())
        .ok_or(XpError::Overflow("xp_earned"))
}

#[cfg(test)]
mod tests {
    use studyquest_types::{EventId, QuestionId};

    use super::*;

    fn choice_question(position: u32, correct_index: u32) -> Question {
        Question {
            id: QuestionId::new(),
            event_id: EventId::new(),
            position,
            prompt: format!("Question {position}"),
            answer: QuestionAnswerKind::MultipleChoice {
                options: vec!["a".to_owned(), "b".to_owned(), "c".to_owned(), "d".to_owned()],
                correct_index,
            },
        }
    }

    fn free_text_question(position: u32) -> Question {
        Question {
            id: QuestionId::new(),
            event_id: EventId::new(),
            position,
            prompt: "Explain".to_owned(),
            answer: QuestionAnswerKind::FreeText,
        }
    }

    #[test]
    fn score_counts_positional_matches() {
        let questions = vec![choice_question(0, 1), choice_question(1, 2), choice_question(2, 0)];
        let answers = vec![Answer::Choice(1), Answer::Choice(0), Answer::Choice(0)];
        assert_eq!(score_answers(&questions, &answers), 2);
    }

    #[test]
    fn free_text_and_skips_never_score() {
        let questions = vec![free_text_question(0), choice_question(1, 3)];
        let answers = vec![Answer::Text("because".to_owned()), Answer::Skipped];
        assert!(validate_answers(&questions, &answers).is_ok());
        assert_eq!(score_answers(&questions, &answers), 0);
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let questions = vec![choice_question(0, 0), choice_question(1, 0)];
        let answers = vec![Answer::Choice(0)];
        assert_eq!(
            validate_answers(&questions, &answers),
            Err(AnswerError::CountMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn out_of_range_choice_is_rejected() {
        let questions = vec![choice_question(0, 0)];
        let answers = vec![Answer::Choice(4)];
        assert_eq!(
            validate_answers(&questions, &answers),
            Err(AnswerError::ChoiceOutOfRange {
                position: 0,
                choice: 4,
                options: 4
            })
        );
    }

    #[test]
    fn answer_kind_must_match_question_kind() {
        let questions = vec![choice_question(0, 0), free_text_question(1)];
        assert_eq!(
            validate_answers(&questions, &[Answer::Text("x".to_owned()), Answer::Skipped]),
            Err(AnswerError::TextForChoice { position: 0 })
        );
        assert_eq!(
            validate_answers(&questions, &[Answer::Skipped, Answer::Choice(0)]),
            Err(AnswerError::ChoiceForFreeText { position: 1 })
        );
    }

    #[test]
    fn empty_event_is_rejected() {
        assert_eq!(validate_answers(&[], &[]), Err(AnswerError::NoQuestions));
    }

    #[test]
    fn eight_of_ten_on_fifty_reward_is_forty() {
        assert_eq!(xp_for_score(8, 10, 50), Ok(40));
    }

    #[test]
    fn xp_rounds_half_away_from_zero() {
        // 1/4 * 10 = 2.5
        assert_eq!(xp_for_score(1, 4, 10), Ok(3));
        // 1/3 * 10 = 3.33
        assert_eq!(xp_for_score(1, 3, 10), Ok(3));
        assert_eq!(xp_for_score(0, 3, 10), Ok(0));
    }

    #[test]
    fn xp_rejects_degenerate_inputs() {
        assert_eq!(xp_for_score(1, 0, 10), Err(XpError::NoQuestions));
        assert!(matches!(
            xp_for_score(1, 1, -5),
            Err(XpError::Negative { field: "xp_reward", .. })
        ));
    }
}
