//! # AWS SQS Consumer
//!
//! A bounded-concurrency AWS SQS consumer. It pulls batches sized to the
//! free handler capacity, runs a user handler for every message on its own
//! task and deletes or releases each message according to the handler's
//! outcome.
//!
//! ## Features
//!
//! - Admission control: at most `max_concurrent_handlers` handlers at once
//! - Handlers return an outcome; the consumer performs the delete or
//!   visibility change, exactly once per message
//! - Panicking handlers are caught, retried and reported to a fault sink
//! - Optional lease extension for long-running handlers
//! - Single-run mode and cooperative cancellation with a bounded drain
//! - Batch producer API
//! - Environment-driven setup (`SqsConsumer::from_env`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rs_sqs_consumer::client::create_sqs_client_from_env;
//! use rs_sqs_consumer::consumer::{HandlerOutcome, SqsConsumer, SqsConsumerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = create_sqs_client_from_env().await;
//!     let queue_url = "https://sqs.region.amazonaws.com/account/queue-name";
//!
//!     let config = SqsConsumerConfig {
//!         max_concurrent_handlers: 4,
//!         ..SqsConsumerConfig::default()
//!     };
//!     let mut consumer = SqsConsumer::from_sqs_client(client, queue_url, config, "shared state".to_string())?;
//!     consumer.register_handler_fn(|message, shared| async move {
//!         println!("Processing message: {} with shared: {}", message.body(), shared);
//!         Ok(HandlerOutcome::Completed)
//!     });
//!
//!     let shutdown = consumer.shutdown_token();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.cancel();
//!     });
//!
//!     consumer.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod consumer;
pub mod errors;
pub mod queue;
