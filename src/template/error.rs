use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    ParseError(#[from] toml_edit::TomlError),

    #[error("TOML decode error: {0}")]
    TomlError(#[from] toml_edit::de::Error),

    #[error("TOML encode error: {0}")]
    TomlSerError(#[from] toml_edit::ser::Error),

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid template name: {0:?}")]
    InvalidName(String),
}
