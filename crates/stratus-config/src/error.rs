use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Definition file not found. Looked in:\n\
        - current directory: stratus.local.kdl, .stratus.local.kdl, stratus.kdl, .stratus.kdl\n\
        - ./.stratus/ directory\n\
        - ~/.config/stratus/stratus.kdl\n\
        Set STRATUS_CONFIG_PATH to point at a file directly"
    )]
    DefinitionNotFound,

    #[error("STRATUS_CONFIG_PATH points at a missing file: {0}")]
    ConfigPathMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
