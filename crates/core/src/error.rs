use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("env var not found: {0}")]
    MissingEnv(String),

    #[error("unclosed env var reference in: {0}")]
    UnclosedEnvRef(String),

    #[error("invalid settings for notifier '{name}': {reason}")]
    Settings { name: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
