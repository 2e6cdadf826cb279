use dhub_derive::dhub_error;
use std::borrow::Cow;

#[dhub_error]
pub enum ChainError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Processor failed{}: {message}", format_context(.context))]
    Processor { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<(), ChainError> {
    std::fs::read("missing").context("reading descriptor")?;
    Ok(())
}

fn main() {
    let err: ChainError = "boom".into();
    assert!(matches!(err, ChainError::Internal { .. }));
    let _ = read();
}
