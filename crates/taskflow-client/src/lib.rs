//! Streaming client for the Taskflow gateway.
//!
//! Turns the gateway's `text/event-stream` body back into task, step and
//! content callbacks, and can be cancelled at any point without the
//! cancellation surfacing as an error.
//!
//! ```no_run
//! use taskflow_client::{ChatClient, TaskStreamState};
//! use taskflow_protocol::request::{ChatMessage, ChatRequestBody};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> taskflow_client::Result<()> {
//! let client = ChatClient::new("http://127.0.0.1:8787");
//! let body = ChatRequestBody::new(vec![ChatMessage::user("hi")]);
//! let mut state = TaskStreamState::new(0);
//! client.stream_chat(&body, &mut state, &CancellationToken::new()).await?;
//! println!("{}", state.content());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod consumer;
pub mod error;
pub mod state;

pub use client::{ChatClient, Features, HealthResponse, StreamOutcome};
pub use consumer::{dispatch, Dispatch, StreamHandler};
pub use error::{ClientError, Result};
pub use state::TaskStreamState;
