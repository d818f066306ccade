pub mod openai;
pub mod orchestrator;
pub mod provider;
pub mod router;
pub mod skills;
pub mod stream;
pub mod tools;
