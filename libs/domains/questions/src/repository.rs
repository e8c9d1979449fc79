use async_trait::async_trait;
use uuid::Uuid;

use crate::error::QuestionResult;
use crate::models::{Answer, CreateAnswer, Question};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    async fn find_question(&self, question_id: i64) -> QuestionResult<Option<Question>>;

    async fn exists_by_question_and_author(
        &self,
        question_id: i64,
        author_id: Uuid,
    ) -> QuestionResult<bool>;

    async fn create(&self, input: CreateAnswer) -> QuestionResult<Answer>;
}
