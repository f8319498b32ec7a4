//! entigen-descriptor
//!
//! This crate implements:
//!  1) A byte-oriented reader/writer for the entigen descriptor-set wire format,
//!  2) Descriptor types (`SchemaFile`, `ServiceDefinition`, `MethodDefinition`, ...),
//!  3) `encode_descriptor_set` / `decode_descriptor_set`,
//!  4) `read(path)` with transitive cross-file type resolution,
//!  5) Error types (`DescriptorError`).

pub mod bb;
pub mod error;
pub mod types;
pub mod utils;
pub mod reader;

pub use reader::read;
pub use reader::decode_descriptor_set;
pub use reader::encode_descriptor_set;
pub use reader::SCALAR_TYPES;
