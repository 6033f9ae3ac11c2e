mod conversations;
mod vectors;

pub use conversations::ConversationRepository;
pub use vectors::VectorRepository;
