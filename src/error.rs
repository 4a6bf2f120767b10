use thiserror::Error;

/// Why a provider payload was rejected for a task. These never escape
/// [`EditorClient::execute`](crate::editor::EditorClient::execute); they only
/// end up as the reason on a failure marker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("unexpected field '{0}'")]
    UnexpectedField(String),

    #[error("field '{0}' is not an array of strings")]
    NotStringArray(String),
}

/// A failure of the batch as a whole. This is the only error an evaluation
/// run can return; individual editor failures are folded into their slots.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("no evaluation tasks configured")]
    EmptyCatalog,

    #[error("editor task '{task}' could not be joined: {source}")]
    Join {
        task: String,
        #[source]
        source: tokio::task::JoinError,
    },
}
