use dhub_services::ServiceError;
use std::borrow::Cow;

#[dhub_derive::dhub_error]
pub enum DeploymentError {
    /// The deployment content could not be mounted.
    #[error("Mount failed{}: {message}", format_context(.context))]
    Mount { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Walk error{}: {source}", format_context(.context))]
    Walk { source: walkdir::Error, context: Option<Cow<'static, str>> },

    /// A processor needed an attachment an earlier processor should have added.
    #[error("Missing attachment{}: {message}", format_context(.context))]
    MissingAttachment { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Deployment metadata (manifest headers, descriptors) is malformed.
    #[error("Invalid descriptor{}: {message}", format_context(.context))]
    Descriptor { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Selector error{}: {message}", format_context(.context))]
    Selector { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("No deployment chain{}: {message}", format_context(.context))]
    NoChain { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Already deployed{}: {message}", format_context(.context))]
    Duplicate { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Not deployed{}: {message}", format_context(.context))]
    NotDeployed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Wraps the error of the processor that aborted a chain.
    #[error("Processor {processor} at priority {priority:#x} failed{}: {reason}", format_context(.context))]
    Processor {
        processor: Cow<'static, str>,
        priority: i64,
        reason: Box<DeploymentError>,
        context: Option<Cow<'static, str>>,
    },

    /// Services installed for the deployment failed or miss dependencies.
    #[error("Deployment verification failed{}: {message}", format_context(.context))]
    Verification { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Service error{}: {source}", format_context(.context))]
    Service { source: ServiceError, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl DeploymentError {
    /// Priority of the processor that aborted the chain, if this is a processor failure.
    #[must_use]
    pub const fn failed_priority(&self) -> Option<i64> {
        match self {
            Self::Processor { priority, .. } => Some(*priority),
            _ => None,
        }
    }

    /// The innermost error, unwrapping processor failures.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Processor { reason, .. } => reason.root_cause(),
            other => other,
        }
    }
}
