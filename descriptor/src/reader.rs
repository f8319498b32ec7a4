use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::{
    bb::{ByteBuffer, ByteBufferMut},
    error::DescriptorError,
    types::{MessageField, MessageType, MethodDefinition, SchemaFile, ServiceDefinition, ServiceKind},
    utils::quote,
};

/// First four bytes of every descriptor set.
pub const MAGIC: &[u8; 4] = b"EDS1";

/// Type names that resolve without a message definition.
pub const SCALAR_TYPES: [&str; 9] = [
    "bool", "bytes", "int32", "int64", "uint32", "uint64", "float", "double", "string",
];

/// Load a descriptor set from disk and resolve all cross-file type references.
///
/// Fails with `CannotOpen` if the path is missing or unreadable, `Malformed`
/// if the bytes do not decode, and `UnresolvedImport` if any import names a
/// file absent from the set or any referenced type is not defined anywhere in
/// the set. Identical bytes always yield identical schema files; nothing
/// outside the input buffer is consulted.
pub fn read(path: &Path) -> Result<Vec<SchemaFile>, DescriptorError> {
    let buffer = fs::read(path).map_err(|source| DescriptorError::CannotOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let files = decode_descriptor_set(&buffer)?;
    resolve_references(&files)?;
    Ok(files)
}

/// Decode a descriptor-set buffer into its schema files. Does not check that
/// type references resolve; `read` layers that on top.
pub fn decode_descriptor_set(buffer: &[u8]) -> Result<Vec<SchemaFile>, DescriptorError> {
    let mut bb = ByteBuffer::new(buffer);

    let magic = bb
        .read_bytes(MAGIC.len())
        .map_err(|_| DescriptorError::Malformed("buffer is shorter than the magic header".into()))?;
    if magic != MAGIC {
        return Err(DescriptorError::Malformed(format!(
            "bad magic header {:?}, expected {:?}",
            magic, MAGIC
        )));
    }

    let file_count = read_count(&mut bb, "file count")?;
    let mut files = Vec::with_capacity(file_count);

    for _ in 0..file_count {
        let name = read_str(&mut bb, "file name")?;
        let package = match read_str(&mut bb, "package")? {
            p if p.is_empty() => None,
            p => Some(p),
        };

        let import_count = read_count(&mut bb, "import count")?;
        let mut imports = Vec::with_capacity(import_count);
        for _ in 0..import_count {
            imports.push(read_str(&mut bb, "import")?);
        }

        let message_count = read_count(&mut bb, "message count")?;
        let mut messages = Vec::with_capacity(message_count);
        for _ in 0..message_count {
            let message_name = read_str(&mut bb, "message name")?;
            let field_count = read_count(&mut bb, "field count")?;
            let mut fields = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                fields.push(MessageField {
                    name:      read_str(&mut bb, "field name")?,
                    type_name: read_str(&mut bb, "field type")?,
                });
            }
            messages.push(MessageType { name: message_name, fields });
        }

        let service_count = read_count(&mut bb, "service count")?;
        let mut services = Vec::with_capacity(service_count);
        for _ in 0..service_count {
            let service_name = read_str(&mut bb, "service name")?;
            let kind_byte = bb
                .read_byte()
                .map_err(|_| DescriptorError::Malformed("failed to read service kind".into()))?;
            let kind = match kind_byte {
                1 => ServiceKind::Action,
                2 => ServiceKind::EventSourced,
                3 => ServiceKind::Value,
                4 => ServiceKind::Replicated,
                // Unknown kinds are a model-builder problem, not a wire problem.
                _ => ServiceKind::Unspecified,
            };

            let persistence_id = match read_str(&mut bb, "persistence id")? {
                p if p.is_empty() => None,
                p => Some(p),
            };
            let state_type = match read_str(&mut bb, "state type")? {
                s if s.is_empty() => None,
                s => Some(s),
            };

            let event_count = read_count(&mut bb, "event count")?;
            let mut events = Vec::with_capacity(event_count);
            for _ in 0..event_count {
                events.push(read_str(&mut bb, "event type")?);
            }

            let method_count = read_count(&mut bb, "method count")?;
            let mut methods = Vec::with_capacity(method_count);
            for _ in 0..method_count {
                let method_name = read_str(&mut bb, "method name")?;
                let input_type = read_str(&mut bb, "method input type")?;
                let output_type = read_str(&mut bb, "method output type")?;
                let entity_key = match read_str(&mut bb, "entity key")? {
                    k if k.is_empty() => None,
                    k => Some(k),
                };
                methods.push(MethodDefinition {
                    name: method_name,
                    input_type,
                    output_type,
                    entity_key,
                });
            }

            services.push(ServiceDefinition {
                name: service_name,
                kind,
                persistence_id,
                state_type,
                events,
                methods,
            });
        }

        files.push(SchemaFile {
            name,
            package,
            imports,
            messages,
            services,
        });
    }

    if bb.index() != buffer.len() {
        return Err(DescriptorError::Malformed(format!(
            "{} trailing bytes after the last schema file",
            buffer.len() - bb.index()
        )));
    }

    Ok(files)
}

/// Encode schema files into descriptor-set bytes, the inverse of
/// `decode_descriptor_set`. Used by tooling that produces descriptor sets and
/// by tests that need binary fixtures.
pub fn encode_descriptor_set(files: &[SchemaFile]) -> Vec<u8> {
    let mut bb = ByteBufferMut::new();
    bb.write_bytes(MAGIC);
    bb.write_var_uint(files.len() as u32);

    for file in files {
        bb.write_string(&file.name);
        bb.write_string(file.package.as_deref().unwrap_or(""));

        bb.write_var_uint(file.imports.len() as u32);
        for import in &file.imports {
            bb.write_string(import);
        }

        bb.write_var_uint(file.messages.len() as u32);
        for message in &file.messages {
            bb.write_string(&message.name);
            bb.write_var_uint(message.fields.len() as u32);
            for field in &message.fields {
                bb.write_string(&field.name);
                bb.write_string(&field.type_name);
            }
        }

        bb.write_var_uint(file.services.len() as u32);
        for service in &file.services {
            bb.write_string(&service.name);
            bb.write_byte(service.kind as u8);
            bb.write_string(service.persistence_id.as_deref().unwrap_or(""));
            bb.write_string(service.state_type.as_deref().unwrap_or(""));

            bb.write_var_uint(service.events.len() as u32);
            for event in &service.events {
                bb.write_string(event);
            }

            bb.write_var_uint(service.methods.len() as u32);
            for method in &service.methods {
                bb.write_string(&method.name);
                bb.write_string(&method.input_type);
                bb.write_string(&method.output_type);
                bb.write_string(method.entity_key.as_deref().unwrap_or(""));
            }
        }
    }

    bb.data()
}

fn read_count(bb: &mut ByteBuffer, what: &str) -> Result<usize, DescriptorError> {
    bb.read_var_uint()
        .map(|count| count as usize)
        .map_err(|_| DescriptorError::Malformed(format!("failed to read {}", what)))
}

fn read_str(bb: &mut ByteBuffer, what: &str) -> Result<String, DescriptorError> {
    bb.read_string()
        .map(|text| text.to_string())
        .map_err(|_| DescriptorError::Malformed(format!("failed to read {}", what)))
}

/// Check that every import names a file present in the set and that every
/// type reference names a scalar or a message defined in some file of the
/// set. Message names resolve both bare and package-qualified.
fn resolve_references(files: &[SchemaFile]) -> Result<(), DescriptorError> {
    let file_names: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
    for file in files {
        for import in &file.imports {
            if !file_names.contains(import.as_str()) {
                return Err(DescriptorError::UnresolvedImport {
                    type_name:       quote(import),
                    referenced_from: file.name.clone(),
                });
            }
        }
    }

    let mut defined: HashSet<String> = SCALAR_TYPES.iter().map(|s| s.to_string()).collect();
    for file in files {
        for message in &file.messages {
            defined.insert(message.name.clone());
            if let Some(package) = &file.package {
                defined.insert(format!("{}.{}", package, message.name));
            }
        }
    }

    let check = |type_name: &str, file: &SchemaFile| -> Result<(), DescriptorError> {
        if defined.contains(type_name) {
            Ok(())
        } else {
            Err(DescriptorError::UnresolvedImport {
                type_name:       quote(type_name),
                referenced_from: file.name.clone(),
            })
        }
    };

    for file in files {
        for message in &file.messages {
            for field in &message.fields {
                check(&field.type_name, file)?;
            }
        }
        for service in &file.services {
            if let Some(state_type) = &service.state_type {
                check(state_type, file)?;
            }
            for event in &service.events {
                check(event, file)?;
            }
            for method in &service.methods {
                check(&method.input_type, file)?;
                check(&method.output_type, file)?;
            }
        }
    }

    Ok(())
}
