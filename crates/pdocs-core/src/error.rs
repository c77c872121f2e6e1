use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdocsError {
    #[error("unknown document type: {0}")]
    UnknownType(String),

    #[error("cannot determine document type for '{0}': pass --type")]
    UnclassifiedPath(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("already registered: {0} (use --force to re-register)")]
    AlreadyRegistered(String),

    #[error("refusing to overwrite existing file: {0}")]
    AlreadyExists(String),

    #[error("not registered: {0}")]
    NotRegistered(String),

    #[error("document type '{0}' has no id sequence")]
    NoSequence(String),

    #[error("invalid id pattern '{0}': expected one {{num}} or {{num:N}} placeholder")]
    InvalidIdPattern(String),

    #[error("no template found for type '{0}'")]
    TemplateNotFound(String),

    #[error("fetching {url} failed with HTTP {status}")]
    RemoteFetch { url: String, status: u16 },

    #[error("http error: {0}")]
    Http(String),

    #[error("watch error: {0}")]
    Watch(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, PdocsError>;
