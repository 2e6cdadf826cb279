use std::borrow::Cow;

#[dhub_derive::dhub_error]
pub enum ServiceError {
    #[error("Duplicate service{}: {message}", format_context(.context))]
    Duplicate { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Installing the service would close a dependency cycle.
    #[error("Dependency cycle{}: {message}", format_context(.context))]
    Cycle { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Service not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid service name{}: {message}", format_context(.context))]
    InvalidName { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A dependency value was requested with the wrong type or is not a declared dependency.
    #[error("Dependency unavailable{}: {message}", format_context(.context))]
    DependencyUnavailable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Service start failed{}: {message}", format_context(.context))]
    StartFailed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
