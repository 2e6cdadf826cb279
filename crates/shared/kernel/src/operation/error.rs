use crate::error::DeploymentError;
use dhub_services::ServiceError;
use std::borrow::Cow;

#[dhub_derive::dhub_error]
pub enum OperationError {
    #[error("Resource not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Duplicate resource{}: {message}", format_context(.context))]
    Duplicate { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Unknown operation{}: {message}", format_context(.context))]
    UnknownOperation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Malformed parameters or a model the subsystem rejects.
    #[error("Invalid operation{}: {message}", format_context(.context))]
    Invalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A runtime step failed; the model change was rolled back.
    #[error("Runtime step failed{}: {message}", format_context(.context))]
    Runtime { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Deployment error{}: {source}", format_context(.context))]
    Deployment { source: DeploymentError, context: Option<Cow<'static, str>> },

    #[error("Service error{}: {source}", format_context(.context))]
    Service { source: ServiceError, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
