mod traits;
mod completion;

pub use traits::*;
pub use completion::CompletionClient;
