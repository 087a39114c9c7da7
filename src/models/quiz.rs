use mongodb::bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

use super::validation::FieldErrors;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    #[serde(default = "default_points")]
    pub points: u32,
}

fn default_points() -> u32 {
    1
}

pub const MAX_QUESTION_POINTS: u32 = 1_000;

fn validate_questions(errors: &mut FieldErrors, questions: &[Question]) {
    for (index, question) in questions.iter().enumerate() {
        let field = format!("questions[{}]", index);
        if question.question.trim().is_empty() {
            errors.add(&field, "Question text is required");
        } else if question.options.len() < 2 {
            errors.add(&field, "At least two options are required");
        } else if question.correct_option >= question.options.len() {
            errors.add(&field, "correct_option must index one of the options");
        } else if question.points == 0 || question.points > MAX_QUESTION_POINTS {
            errors.add(&field, format!("Points must be between 1 and {}", MAX_QUESTION_POINTS));
        }
    }
}

fn questions_to_bson(questions: &[Question]) -> Result<Bson, ApiError> {
    mongodb::bson::to_bson(questions)
        .map_err(|e| ApiError::internal_server_error(format!("Failed to encode questions: {}", e)))
}

#[derive(Debug, Deserialize)]
pub struct CreateQuizRequest {
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    pub passing_score: f64,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: Option<i32>,
    #[serde(default)]
    pub is_published: bool,
}

impl CreateQuizRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.text("title", &self.title, 2, 200);
        errors.range("passing_score", self.passing_score, 0.0, 100.0);
        if matches!(self.time_limit_minutes, Some(m) if m <= 0) {
            errors.add("time_limit_minutes", "Time limit must be positive");
        }
        if matches!(self.max_attempts, Some(n) if n <= 0) {
            errors.add("max_attempts", "Max attempts must be positive");
        }
        validate_questions(&mut errors, &self.questions);
        errors.finish()
    }

    pub fn into_document(self, course_id: &str) -> Result<Document, ApiError> {
        let mut document = doc! {
            "course_id": course_id,
            "title": self.title.trim(),
            "questions": questions_to_bson(&self.questions)?,
            "passing_score": self.passing_score,
            "is_published": self.is_published,
        };
        if let Some(minutes) = self.time_limit_minutes {
            document.insert("time_limit_minutes", minutes);
        }
        if let Some(max) = self.max_attempts {
            document.insert("max_attempts", max);
        }
        Ok(document)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuizRequest {
    pub title: Option<String>,
    pub questions: Option<Vec<Question>>,
    pub passing_score: Option<f64>,
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: Option<i32>,
    pub is_published: Option<bool>,
}

impl UpdateQuizRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            errors.text("title", title, 2, 200);
        }
        if let Some(score) = self.passing_score {
            errors.range("passing_score", score, 0.0, 100.0);
        }
        if matches!(self.time_limit_minutes, Some(m) if m <= 0) {
            errors.add("time_limit_minutes", "Time limit must be positive");
        }
        if matches!(self.max_attempts, Some(n) if n <= 0) {
            errors.add("max_attempts", "Max attempts must be positive");
        }
        if let Some(questions) = &self.questions {
            validate_questions(&mut errors, questions);
        }
        errors.finish()
    }

    pub fn to_set_document(&self) -> Result<Document, ApiError> {
        let mut set = Document::new();
        if let Some(title) = &self.title {
            set.insert("title", title.trim());
        }
        if let Some(questions) = &self.questions {
            set.insert("questions", questions_to_bson(questions)?);
        }
        if let Some(score) = self.passing_score {
            set.insert("passing_score", score);
        }
        if let Some(minutes) = self.time_limit_minutes {
            set.insert("time_limit_minutes", minutes);
        }
        if let Some(max) = self.max_attempts {
            set.insert("max_attempts", max);
        }
        if let Some(published) = self.is_published {
            set.insert("is_published", published);
        }
        Ok(set)
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    /// Selected option index per question; `null` leaves a question unanswered
    pub answers: Vec<Option<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeResult {
    pub score: u64,
    pub max_score: u64,
    pub percentage: f64,
    pub passed: bool,
}

/// Grade answers positionally against the quiz's questions. Unanswered or
/// out-of-range answers score zero.
pub fn grade(questions: &[Question], answers: &[Option<usize>], passing_score: f64) -> GradeResult {
    let max_score = questions
        .iter()
        .map(|q| u64::from(q.points))
        .fold(0, u64::saturating_add);
    let score = questions
        .iter()
        .enumerate()
        .filter(|(i, q)| answers.get(*i).copied().flatten() == Some(q.correct_option))
        .map(|(_, q)| u64::from(q.points))
        .fold(0, u64::saturating_add);

    let percentage = if max_score == 0 {
        0.0
    } else {
        round2(score as f64 / max_score as f64 * 100.0)
    };

    GradeResult {
        score,
        max_score,
        percentage,
        passed: percentage >= passing_score,
    }
}

pub fn attempt_limit_reached(max_attempts: i32) -> ApiError {
    ApiError::conflict(format!("Maximum of {} attempts reached for this quiz", max_attempts))
}

/// Fails with 409 once `used` attempts exhaust `max_attempts`; no limit when unset
pub fn check_attempt_limit(max_attempts: Option<i32>, used: u64) -> Result<(), ApiError> {
    match max_attempts {
        Some(max) if used >= u64::try_from(max).unwrap_or(0) => Err(attempt_limit_reached(max)),
        _ => Ok(()),
    }
}

/// Counter query that matches only while another attempt is allowed
pub fn attempt_slot_query(mut key: Document, max_attempts: Option<i32>) -> Document {
    if let Some(max) = max_attempts {
        key.insert("used", doc! { "$lt": max });
    }
    key
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Decode the stored `questions` array of a quiz document
pub fn stored_questions(quiz: &Document) -> Result<Vec<Question>, ApiError> {
    match quiz.get("questions") {
        Some(value) => mongodb::bson::from_bson(value.clone()).map_err(|e| {
            tracing::error!("Stored quiz questions are malformed: {}", e);
            ApiError::internal_server_error("Stored quiz is malformed")
        }),
        None => Ok(vec![]),
    }
}

/// Remove answer keys so students can take the quiz
pub fn strip_answers(mut quiz: Document) -> Document {
    if let Ok(questions) = quiz.get_array_mut("questions") {
        for question in questions.iter_mut() {
            if let Bson::Document(q) = question {
                q.remove("correct_option");
            }
        }
    }
    quiz
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions() -> Vec<Question> {
        vec![
            Question { question: "2+2".into(), options: vec!["3".into(), "4".into()], correct_option: 1, points: 1 },
            Question { question: "Capital of France".into(), options: vec!["Paris".into(), "Rome".into()], correct_option: 0, points: 2 },
            Question { question: "Rust mascot".into(), options: vec!["Ferris".into(), "Gopher".into(), "Duke".into()], correct_option: 0, points: 3 },
        ]
    }

    #[test]
    fn grades_weighted_points() {
        let result = grade(&questions(), &[Some(1), Some(0), Some(1)], 50.0);
        assert_eq!(result.score, 3);
        assert_eq!(result.max_score, 6);
        assert_eq!(result.percentage, 50.0);
        assert!(result.passed);
    }

    #[test]
    fn unanswered_and_out_of_range_score_zero() {
        let result = grade(&questions(), &[None, Some(9)], 60.0);
        assert_eq!(result.score, 0);
        assert_eq!(result.percentage, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        let qs = vec![
            Question { question: "a".into(), options: vec!["x".into(), "y".into()], correct_option: 0, points: 1 },
            Question { question: "b".into(), options: vec!["x".into(), "y".into()], correct_option: 0, points: 1 },
            Question { question: "c".into(), options: vec!["x".into(), "y".into()], correct_option: 0, points: 1 },
        ];
        let result = grade(&qs, &[Some(0), Some(1), Some(1)], 33.33);
        assert_eq!(result.percentage, 33.33);
        assert!(result.passed);
    }

    #[test]
    fn invalid_questions_are_reported() {
        let request = CreateQuizRequest {
            title: "Checkpoint".into(),
            questions: vec![Question { question: "Q".into(), options: vec!["only".into()], correct_option: 0, points: 1 }],
            passing_score: 120.0,
            time_limit_minutes: None,
            max_attempts: Some(0),
            is_published: false,
        };
        let body = request.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["questions[0]"].is_string());
        assert!(body["field_errors"]["passing_score"].is_string());
        assert!(body["field_errors"]["max_attempts"].is_string());
    }

    #[test]
    fn question_points_are_capped() {
        let heavy = |points| Question { question: "Q".into(), options: vec!["a".into(), "b".into()], correct_option: 0, points };
        let mut errors = FieldErrors::new();
        validate_questions(&mut errors, &[heavy(u32::MAX), heavy(1), heavy(MAX_QUESTION_POINTS)]);
        let body = errors.finish().unwrap_err().to_json();
        assert!(body["field_errors"]["questions[0]"].is_string());
        assert!(body["field_errors"]["questions[1]"].is_null());
        assert!(body["field_errors"]["questions[2]"].is_null());
    }

    #[test]
    fn grading_large_stored_point_values_does_not_overflow() {
        let heavy = Question { question: "Q".into(), options: vec!["a".into(), "b".into()], correct_option: 0, points: u32::MAX };
        let light = Question { points: 1, ..heavy.clone() };
        let result = grade(&[heavy, light], &[Some(0), Some(0)], 50.0);
        assert_eq!(result.max_score, u64::from(u32::MAX) + 1);
        assert_eq!(result.score, result.max_score);
        assert_eq!(result.percentage, 100.0);
    }

    #[test]
    fn attempt_limit_is_enforced_at_max() {
        assert!(check_attempt_limit(None, 500).is_ok());
        assert!(check_attempt_limit(Some(3), 2).is_ok());

        let err = check_attempt_limit(Some(3), 3).unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert!(check_attempt_limit(Some(3), 4).is_err());
    }

    #[test]
    fn attempt_slots_are_bounded_by_the_limit() {
        let key = doc! { "quiz_id": "q1", "student_id": "s1" };
        let limited = attempt_slot_query(key.clone(), Some(2));
        assert_eq!(limited.get_document("used").unwrap(), &doc! { "$lt": 2 });
        assert_eq!(limited.get_str("student_id").unwrap(), "s1");

        assert_eq!(attempt_slot_query(key.clone(), None), key);
    }

    #[test]
    fn students_never_see_answer_keys() {
        let request = CreateQuizRequest {
            title: "Checkpoint".into(),
            questions: questions(),
            passing_score: 70.0,
            time_limit_minutes: Some(15),
            max_attempts: Some(3),
            is_published: true,
        };
        let stored = request.into_document("course").unwrap();
        assert_eq!(stored_questions(&stored).unwrap().len(), 3);

        let stripped = strip_answers(stored);
        for question in stripped.get_array("questions").unwrap() {
            let question = question.as_document().unwrap();
            assert!(!question.contains_key("correct_option"));
            assert!(question.contains_key("options"));
        }
    }
}
