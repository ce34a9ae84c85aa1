/// Core error type.
///
/// User-state conditions (already paired, not yet verified, banned) are not
/// errors: the engine reports them as outcome variants so the adapter can
/// answer with a status message. Errors here are infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
