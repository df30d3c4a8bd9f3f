use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown stage `{name}`")]
    UnknownStage { name: String },

    #[error("stage `{name}` is defined twice")]
    DuplicateStage { name: String },

    /// Neither a conf directory nor a config file is set.
    #[error("could not find configuration")]
    NoConfiguration,

    #[error(transparent)]
    Config(#[from] relaybot_config::Error),

    #[error(transparent)]
    Common(#[from] relaybot_common::Error),
}

impl Error {
    #[must_use]
    pub fn unknown_stage(name: impl Into<String>) -> Self {
        Self::UnknownStage { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
