pub mod chat;
pub mod conversations;
pub mod health;
pub mod knowledge;

pub use health::health_check;
