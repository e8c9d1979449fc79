//! Questions Domain
//!
//! The producing side of the notification pipeline: answering a question
//! emits an `AnswerCreatedEvent` for the question's author.
//!
//! ```rust,ignore
//! let (events, publisher_task) =
//!     DetachedPublisher::from_config(broker, &amqp_config, DOMAIN_EVENTS_EXCHANGE);
//! let answers = AnswerService::new(repository, events);
//! answers.create_answer(question_id, author_id, text).await?;
//! ```

pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use error::{QuestionError, QuestionResult};
pub use models::{Answer, CreateAnswer, Question};
pub use repository::AnswerRepository;
pub use service::AnswerService;
