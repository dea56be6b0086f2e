//! Error types and result aliases.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Cyclic dependency between packages: {}", members.join(", "))]
    CyclicDependency { members: Vec<String> },

    #[error("Unsupported schema version {found:?} for {context}")]
    SchemaVersionMismatch {
        context: &'static str,
        found: Option<u64>,
    },

    #[error("Release id space exhausted: every adjective-noun pair is taken")]
    IdSpaceExhausted,

    #[error("Package not found in workspace: {name}")]
    PackageNotFound { name: String },

    #[error("Tool invocation failed: {command} (exit status: {status:?})\n{output}")]
    ToolInvocation {
        command: String,
        status: Option<i32>,
        output: String,
    },

    #[error(
        "Publish aborted after {} package(s); compensation attempted: {source}",
        published.len()
    )]
    PartialPublish {
        published: Vec<String>,
        source: Box<Error>,
    },

    #[error("Forge request failed: {0}")]
    Forge(String),

    #[error("Invalid version for {package}: {message}")]
    InvalidVersion { package: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
