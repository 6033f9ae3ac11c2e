mod conversation;
mod knowledge;

pub use conversation::*;
pub use knowledge::*;
