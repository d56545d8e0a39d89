#[derive(thiserror::Error, Debug)]
pub enum ScpgateError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
