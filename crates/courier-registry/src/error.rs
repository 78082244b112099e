/// Errors that can occur while invoking a registered handler.
///
/// The two variants map onto two different failure replies: `BadInput`
/// becomes a `bad-request` reply (the sender shipped a body that doesn't
/// match the registered shape), `Failed` becomes a `handler-failed`
/// reply (the handler itself reported an error).
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The wire body did not decode against the registered input shape.
    #[error("request body does not match {expected}: {detail}")]
    BadInput {
        /// The registered input shape's type name.
        expected: &'static str,
        /// What the decoder rejected.
        detail: String,
    },

    /// The handler ran and reported a failure, or its result could not
    /// be encoded.
    #[error("{0}")]
    Failed(String),
}
