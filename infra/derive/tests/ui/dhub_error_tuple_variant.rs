use dhub_derive::dhub_error;

#[dhub_error]
pub enum MountError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
}

fn main() {}
