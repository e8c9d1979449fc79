use amqp_worker::DetachedPublisher;
use domain_events::AnswerCreatedEvent;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{QuestionError, QuestionResult};
use crate::models::{Answer, CreateAnswer};
use crate::repository::AnswerRepository;

pub struct AnswerService<R: AnswerRepository> {
    repository: Arc<R>,
    events: DetachedPublisher,
}

impl<R: AnswerRepository> AnswerService<R> {
    pub fn new(repository: R, events: DetachedPublisher) -> Self {
        Self {
            repository: Arc::new(repository),
            events,
        }
    }

    /// Store an answer and notify the question's author.
    ///
    /// The event is handed to the detached publisher after the answer is
    /// stored; whether it reaches the broker has no effect on the result.
    #[instrument(skip(self, text))]
    pub async fn create_answer(
        &self,
        question_id: i64,
        author_id: Uuid,
        text: String,
    ) -> QuestionResult<Answer> {
        let input = CreateAnswer {
            question_id,
            author_id,
            text,
        };
        input.validate()?;

        let question = self
            .repository
            .find_question(question_id)
            .await?
            .ok_or(QuestionError::QuestionNotFound(question_id))?;

        if question.author_id == author_id {
            return Err(QuestionError::AnswerOwnQuestion);
        }
        if self
            .repository
            .exists_by_question_and_author(question_id, author_id)
            .await?
        {
            return Err(QuestionError::AnswerAlreadyExists(question_id));
        }

        let answer = self.repository.create(input).await?;
        info!(answer_id = answer.id, "Created answer");

        let event = AnswerCreatedEvent::new(
            answer.author_id,
            question.author_id,
            question.id,
            question.title,
            answer.id,
        );
        if !self.events.submit(&event) {
            warn!(answer_id = answer.id, "Answer notification was not queued");
        }

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Question;
    use crate::repository::MockAnswerRepository;
    use amqp_worker::{BrokerError, MessagePublisher, OutboundMessage};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    const QUESTION_ID: i64 = 11;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<OutboundMessage>>,
    }

    #[async_trait]
    impl MessagePublisher for RecordingPublisher {
        async fn publish(&self, message: OutboundMessage) -> Result<(), BrokerError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    /// Broker that never answers
    struct UnreachableBroker;

    #[async_trait]
    impl MessagePublisher for UnreachableBroker {
        async fn publish(&self, _message: OutboundMessage) -> Result<(), BrokerError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(BrokerError::Timeout(Duration::from_secs(3600)))
        }
    }

    fn repository(question_author: Uuid) -> MockAnswerRepository {
        let mut repo = MockAnswerRepository::new();
        repo.expect_find_question().returning(move |id| {
            Ok(Some(Question {
                id,
                title: "What is Send?".into(),
                author_id: question_author,
            }))
        });
        repo.expect_exists_by_question_and_author()
            .returning(|_, _| Ok(false));
        repo.expect_create().returning(|input| {
            Ok(Answer {
                id: 99,
                question_id: input.question_id,
                author_id: input.author_id,
                text: input.text,
                created_at: Utc::now(),
            })
        });
        repo
    }

    #[tokio::test]
    async fn test_answer_publishes_event_for_question_author() {
        let question_author = Uuid::now_v7();
        let answerer = Uuid::now_v7();
        let recorder = Arc::new(RecordingPublisher::default());
        let (events, handle) =
            DetachedPublisher::spawn(recorder.clone(), 8, domain_events::DOMAIN_EVENTS_EXCHANGE);
        let service = AnswerService::new(repository(question_author), events);

        let answer = service
            .create_answer(QUESTION_ID, answerer, "It marks thread-safe types".into())
            .await
            .unwrap();
        assert_eq!(answer.id, 99);

        drop(service);
        handle.await.unwrap();

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].routing_key, "answer.created");
        assert_eq!(sent[0].type_id, "answer_created");

        let body = domain_events::decode_answer_created(&sent[0].body).unwrap();
        assert_eq!(body.user_id, question_author);
        assert_eq!(body.actor_id, answerer);
        assert_eq!(body.question_id, QUESTION_ID);
        assert_eq!(body.answer_id, 99);
        assert_eq!(body.question_title, "What is Send?");
    }

    #[tokio::test]
    async fn test_answer_succeeds_while_broker_is_down() {
        let (events, _handle) =
            DetachedPublisher::spawn(Arc::new(UnreachableBroker), 1, "question-events");
        let service = AnswerService::new(repository(Uuid::now_v7()), events);

        for _ in 0..3 {
            let result = tokio::time::timeout(
                Duration::from_secs(1),
                service.create_answer(QUESTION_ID, Uuid::now_v7(), "answer".into()),
            )
            .await
            .expect("answer creation must not wait on the broker");
            assert!(result.is_ok());
        }
    }

    #[tokio::test]
    async fn test_own_question_is_rejected_without_event() {
        let author = Uuid::now_v7();
        let recorder = Arc::new(RecordingPublisher::default());
        let (events, handle) = DetachedPublisher::spawn(recorder.clone(), 8, "question-events");

        let mut repo = MockAnswerRepository::new();
        repo.expect_find_question().returning(move |id| {
            Ok(Some(Question {
                id,
                title: "t".into(),
                author_id: author,
            }))
        });
        repo.expect_create().never();
        let service = AnswerService::new(repo, events);

        let result = service.create_answer(QUESTION_ID, author, "me".into()).await;
        assert!(matches!(result, Err(QuestionError::AnswerOwnQuestion)));

        drop(service);
        handle.await.unwrap();
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_answer_by_same_user_is_rejected() {
        let (events, _handle) =
            DetachedPublisher::spawn(Arc::new(RecordingPublisher::default()), 8, "question-events");
        let mut repo = MockAnswerRepository::new();
        repo.expect_find_question().returning(|id| {
            Ok(Some(Question {
                id,
                title: "t".into(),
                author_id: Uuid::now_v7(),
            }))
        });
        repo.expect_exists_by_question_and_author()
            .returning(|_, _| Ok(true));
        repo.expect_create().never();
        let service = AnswerService::new(repo, events);

        let result = service
            .create_answer(QUESTION_ID, Uuid::now_v7(), "again".into())
            .await;
        assert!(matches!(result, Err(QuestionError::AnswerAlreadyExists(QUESTION_ID))));
    }

    #[tokio::test]
    async fn test_missing_question_and_blank_text() {
        let (events, _handle) =
            DetachedPublisher::spawn(Arc::new(RecordingPublisher::default()), 8, "question-events");
        let mut repo = MockAnswerRepository::new();
        repo.expect_find_question().returning(|_| Ok(None));
        let service = AnswerService::new(repo, events);

        assert!(matches!(
            service.create_answer(QUESTION_ID, Uuid::now_v7(), "x".into()).await,
            Err(QuestionError::QuestionNotFound(QUESTION_ID))
        ));
        assert!(matches!(
            service.create_answer(QUESTION_ID, Uuid::now_v7(), String::new()).await,
            Err(QuestionError::Validation(_))
        ));
    }
}
