use dhub_derive::dhub_error;

#[dhub_error]
pub enum MountError {
    #[error("IO error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<String>,
    },
}

fn main() {}
