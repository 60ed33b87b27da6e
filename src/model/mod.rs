use thiserror::Error;

pub mod index;
pub mod platform;
pub mod recipe;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading configuration toml: {0}")]
    IO(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Missing TOML key `{0}` while parsing")]
    MissingKey(String),
    #[error("Invalid package reference `{0}`, expected `name/version[@user/channel]`")]
    InvalidReference(String),
    #[error("Unsupported value for option `{package}:{option}`, expected a boolean, integer or string")]
    InvalidOptionValue { package: String, option: String },
    #[error("Unknown key `{0}` in platform rule")]
    InvalidRuleKey(String),
    #[error("Unsupported lock file version {0}")]
    UnsupportedLockFileVersion(String),
}
