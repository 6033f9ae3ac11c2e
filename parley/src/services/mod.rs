mod orchestrator;
mod state_store;

pub use orchestrator::{ChatOrchestrator, ExchangeRequest};
pub use state_store::ConversationStateStore;
