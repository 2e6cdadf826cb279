use dhub_kernel::operation::OperationError;
use std::borrow::Cow;

/// A specialized [`WebError`] enum of this crate.
#[dhub_derive::dhub_error]
pub enum WebError {
    /// The subsystem model holds a value the web subsystem cannot run with.
    #[error("Invalid web model{}: {message}", format_context(.context))]
    Model { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Two deployments claim the same context root on one host.
    #[error("Context root in use{}: {message}", format_context(.context))]
    ContextConflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal web error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<WebError> for OperationError {
    fn from(err: WebError) -> Self {
        match err {
            WebError::Model { message, context } => Self::Invalid { message, context },
            other => Self::Internal { message: other.to_string().into(), context: None },
        }
    }
}
