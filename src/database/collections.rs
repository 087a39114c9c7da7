//! Collection names

pub const USERS: &str = "users";
pub const FRANCHISES: &str = "franchises";
pub const BRANCHES: &str = "branches";
pub const AGREEMENTS: &str = "agreements";
pub const COURSES: &str = "courses";
pub const MODULES: &str = "modules";
pub const LESSONS: &str = "lessons";
pub const LECTURES: &str = "lectures";
pub const QUIZZES: &str = "quizzes";
pub const QUIZ_ATTEMPTS: &str = "quiz_attempts";
pub const QUIZ_ATTEMPT_COUNTERS: &str = "quiz_attempt_counters";
pub const ENROLLMENTS: &str = "enrollments";
pub const NOTIFICATIONS: &str = "notifications";
pub const SUPPORT_TICKETS: &str = "support_tickets";
pub const ENQUIRIES: &str = "enquiries";
pub const UPLOADS: &str = "uploads";

/// Human label used in not-found messages
pub fn record_label(collection: &str) -> &'static str {
    match collection {
        USERS => "User",
        FRANCHISES => "Franchise",
        BRANCHES => "Branch",
        AGREEMENTS => "Agreement",
        COURSES => "Course",
        MODULES => "Module",
        LESSONS => "Lesson",
        LECTURES => "Lecture",
        QUIZZES => "Quiz",
        QUIZ_ATTEMPTS => "Quiz attempt",
        QUIZ_ATTEMPT_COUNTERS => "Quiz attempt counter",
        ENROLLMENTS => "Enrollment",
        NOTIFICATIONS => "Notification",
        SUPPORT_TICKETS => "Support ticket",
        ENQUIRIES => "Enquiry",
        UPLOADS => "Upload",
        _ => "Record",
    }
}
