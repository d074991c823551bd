//! Builds the instruction text sent as the final user turn of a grounded
//! chat request.

use serde::{Deserialize, Serialize};

/// Controls whether the model may reach beyond the retrieved context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagMode {
    /// Answer from the supplied context only; decline when it is absent.
    Strict,
    /// Prefer the context, allow general knowledge, label the source.
    #[default]
    Hybrid,
}

/// Substitutes `context` and `question` into the fixed template for `mode`.
/// Plain substitution; the result is natural language for the model, not
/// code.
pub fn compose(mode: RagMode, context: &str, question: &str) -> String {
    match mode {
        RagMode::Strict => format!(
            "Based ONLY on the following document information, answer the user's question. \
             If the information is not in the document, state clearly that you cannot answer \
             from the provided document.\n\
             \n\
             DOCUMENT CONTEXT:\n\
             {context}\n\
             \n\
             USER QUESTION: {question}\n\
             \n\
             ANSWER:"
        ),
        RagMode::Hybrid => format!(
            "You have access to the following information from a document. Use it as the \
             primary reference for your answer, but you may supplement it with general \
             knowledge when that is relevant and useful. Make clear when you are drawing on \
             the document and when on general knowledge.\n\
             \n\
             DOCUMENT INFORMATION:\n\
             {context}\n\
             \n\
             USER QUESTION: {question}\n\
             \n\
             INSTRUCTIONS:\n\
             - Prioritize the document information when it answers the question directly\n\
             - If the document does not cover everything, you may fill in with general knowledge\n\
             - Name the source of each part of your answer (\"According to the document...\" or \
             \"From general knowledge...\")\n\
             \n\
             ANSWER:"
        ),
    }
}
