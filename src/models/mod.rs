// Re-export all model types from submodules
mod member;
mod search;

pub use member::*;
pub use search::*;
