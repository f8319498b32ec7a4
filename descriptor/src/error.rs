use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Cannot open descriptor set {}: {source}", .path.display())]
    CannotOpen {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed descriptor set: {0}")]
    Malformed(String),

    #[error("Unresolved reference {type_name} (referenced from {referenced_from})")]
    UnresolvedImport {
        type_name:       String,
        referenced_from: String,
    },
}
