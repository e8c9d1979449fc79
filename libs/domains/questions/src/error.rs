use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuestionError {
    #[error("Question not found: {0}")]
    QuestionNotFound(i64),

    #[error("You can not answer your own question")]
    AnswerOwnQuestion,

    #[error("Question {0} already has an answer from this user")]
    AnswerAlreadyExists(i64),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type QuestionResult<T> = Result<T, QuestionError>;

impl From<validator::ValidationErrors> for QuestionError {
    fn from(err: validator::ValidationErrors) -> Self {
        QuestionError::Validation(err.to_string())
    }
}
