//! Wire types shared by the gateway, the orchestrator and the client.

pub mod events;
pub mod request;
pub mod sse;
pub mod task;
