//! Question answering over the composite index.
//!
//! [`AnswerPipeline`] optionally rewrites the question, retrieves the chunks
//! the caller's [`Role`] may see and asks the chat model to answer from them.

mod answer;
mod rewrite;

pub use answer::{format_context, Answer, AnswerConfig, AnswerPipeline, Role};
pub use rewrite::QueryRewriter;
