use dhub_kernel::DeploymentError;
use std::borrow::Cow;

/// A specialized [`JarError`] enum of this crate.
#[dhub_derive::dhub_error]
pub enum JarError {
    /// The `Dependencies` manifest header could not be understood.
    #[error("Invalid module dependency{}: {message}", format_context(.context))]
    Dependency { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal jar error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<JarError> for DeploymentError {
    fn from(err: JarError) -> Self {
        match err {
            JarError::Dependency { message, context } => Self::Descriptor { message, context },
            JarError::Internal { message, context } => Self::Internal { message, context },
        }
    }
}
