use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
  #[error("io error on {path:?}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("io error: {0}")]
  Stdio(#[from] std::io::Error),

  #[error("failed to parse TOML config: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("config layering failed: {0}")]
  Layer(#[from] config::ConfigError),

  #[error("invalid config: {0}")]
  InvalidConfig(String),

  #[error("{file}:{line}: {msg}")]
  Parse { file: String, line: usize, msg: String },

  #[error("trace serialization failed: {0}")]
  Trace(#[from] serde_json::Error),

  #[error("readline: {0}")]
  Readline(#[from] rustyline::error::ReadlineError),
}

impl SimError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    SimError::Io {
      path: path.into(),
      source,
    }
  }

  pub fn parse(file: impl Into<String>, line: usize, msg: impl Into<String>) -> Self {
    SimError::Parse {
      file: file.into(),
      line,
      msg: msg.into(),
    }
  }

  pub fn invalid(msg: impl Into<String>) -> Self {
    SimError::InvalidConfig(msg.into())
  }
}

pub type Result<T> = std::result::Result<T, SimError>;
