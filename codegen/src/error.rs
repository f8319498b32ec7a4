use std::path::PathBuf;
use thiserror::Error;

/// Classification failures. All of these abort the run before any file is
/// written.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Service {service} has methods but no recognizable entity kind")]
    AmbiguousKind { service: String },

    #[error("Service {service} declares no state type")]
    MissingStateType { service: String },

    #[error("Method {method} on service {service} has no entity-key field path")]
    MissingEntityKey { service: String, method: String },

    #[error("Services {first} and {second} both produce the name {name}")]
    DuplicateEntityName {
        name:   String,
        first:  String,
        second: String,
    },
}

/// Generation failures. Fatal for the affected entity's artifact set;
/// artifacts already committed for earlier entities stay on disk.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Cannot write {}: {source}", .path.display())]
    UnwritableTarget {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Member {member} in {} exists with an incompatible signature", .file.display())]
    SignatureConflict { file: PathBuf, member: String },
}
