use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid listener config: {0}")]
    InvalidConfig(String),

    #[error("unknown listener state: '{0}'")]
    UnknownState(String),
}
