//! Decoding of protoc input
//!
//! `prost_types` drops unknown fields, which is where protoc leaves custom
//! option extensions. The raw file descriptors are therefore decoded a
//! second time through a `prost_reflect::DescriptorPool`, which keeps the
//! option bytes and resolves extensions against the loaded files.

use ease_gateway_common::options::{
    ApiMethod, FieldRules, HttpRule, ServiceSpec, GOOGLE_HTTP_EXTENSION, HTTP_EXTENSION,
    METHOD_EXTENSION, RULES_EXTENSION, SERVICE_SPEC_EXTENSION,
};
use ease_gateway_common::options::ValidationRule;
use ease_gateway_common::{GeneratorError, Result};
use prost::Message as _;
use prost_reflect::{DescriptorPool, DynamicMessage, ExtensionDescriptor, MessageDescriptor, Value};
use prost_types::FileDescriptorProto;
use std::collections::HashMap;
use tracing::debug;

#[derive(Clone, PartialEq, ::prost::Message)]
struct RawCodeGeneratorRequest {
    #[prost(string, repeated, tag = "1")]
    file_to_generate: Vec<String>,
    #[prost(string, optional, tag = "2")]
    parameter: Option<String>,
    #[prost(bytes = "vec", repeated, tag = "15")]
    proto_file: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct RawFileDescriptorSet {
    #[prost(bytes = "vec", repeated, tag = "1")]
    file: Vec<Vec<u8>>,
}

/// Option extension values of one file, keyed by fully qualified name
/// (with a leading dot)
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    /// Service FQSN → deployment spec
    pub services: HashMap<String, ServiceSpec>,
    /// Method FQMN (`.pkg.Service.Method`) → method options
    pub methods: HashMap<String, MethodAnnotation>,
    /// Field FQN (`.pkg.Message.field`) → validation rules
    pub fields: HashMap<String, Vec<ValidationRule>>,
}

/// Options attached to one RPC method
#[derive(Debug, Clone, Default)]
pub struct MethodAnnotation {
    pub http: Option<HttpRule>,
    pub api: Option<ApiMethod>,
}

/// A file descriptor together with its decoded option extensions
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub proto: FileDescriptorProto,
    pub annotations: Annotations,
}

impl SourceFile {
    /// A file without any option extensions
    pub fn new(proto: FileDescriptorProto) -> Self {
        Self {
            proto,
            annotations: Annotations::default(),
        }
    }

    pub fn with_annotations(proto: FileDescriptorProto, annotations: Annotations) -> Self {
        Self { proto, annotations }
    }
}

/// A decoded `CodeGeneratorRequest`
#[derive(Debug, Clone)]
pub struct Request {
    pub file_to_generate: Vec<String>,
    pub parameter: Option<String>,
    /// All files of the request, dependencies first, as protoc sends them
    pub files: Vec<SourceFile>,
}

/// Decodes a serialized `CodeGeneratorRequest`
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let raw = RawCodeGeneratorRequest::decode(bytes).map_err(|e| {
        GeneratorError::Parse(format!("Failed to decode CodeGeneratorRequest: {}", e))
    })?;

    let files = decode_files(raw.proto_file)?;
    Ok(Request {
        file_to_generate: raw.file_to_generate,
        parameter: raw.parameter,
        files,
    })
}

/// Decodes a serialized `FileDescriptorSet` (as written by
/// `protoc --include_imports --descriptor_set_out`)
pub fn decode_descriptor_set(bytes: &[u8]) -> Result<Vec<SourceFile>> {
    let raw = RawFileDescriptorSet::decode(bytes).map_err(|e| {
        GeneratorError::Parse(format!("Failed to decode FileDescriptorSet: {}", e))
    })?;
    decode_files(raw.file)
}

fn decode_files(raw_files: Vec<Vec<u8>>) -> Result<Vec<SourceFile>> {
    let set = RawFileDescriptorSet {
        file: raw_files.clone(),
    };
    let pool = DescriptorPool::decode(set.encode_to_vec().as_slice()).map_err(|e| {
        GeneratorError::Parse(format!("Failed to create DescriptorPool: {}", e))
    })?;
    let extensions = Extensions::new(&pool);

    raw_files
        .iter()
        .map(|raw| {
            let proto = FileDescriptorProto::decode(raw.as_slice()).map_err(|e| {
                GeneratorError::Parse(format!("Failed to decode FileDescriptorProto: {}", e))
            })?;
            let annotations = match pool.get_file_by_name(proto.name()) {
                Some(file) => extensions.collect(&file)?,
                None => Annotations::default(),
            };
            Ok(SourceFile { proto, annotations })
        })
        .collect()
}

/// The option extensions known to the pool
struct Extensions {
    http: Option<ExtensionDescriptor>,
    api: Option<ExtensionDescriptor>,
    rules: Option<ExtensionDescriptor>,
    service_spec: Option<ExtensionDescriptor>,
}

impl Extensions {
    fn new(pool: &DescriptorPool) -> Self {
        let http = pool
            .get_extension_by_name(HTTP_EXTENSION)
            .or_else(|| pool.get_extension_by_name(GOOGLE_HTTP_EXTENSION));
        if http.is_none() {
            debug!("no HTTP rule extension in the descriptor pool");
        }

        Self {
            http,
            api: pool.get_extension_by_name(METHOD_EXTENSION),
            rules: pool.get_extension_by_name(RULES_EXTENSION),
            service_spec: pool.get_extension_by_name(SERVICE_SPEC_EXTENSION),
        }
    }

    fn collect(&self, file: &prost_reflect::FileDescriptor) -> Result<Annotations> {
        let mut annotations = Annotations::default();

        for service in file.services() {
            if let Some(spec) = decode_extension::<ServiceSpec>(&service.options(), &self.service_spec)? {
                annotations
                    .services
                    .insert(format!(".{}", service.full_name()), spec);
            }

            for method in service.methods() {
                let options = method.options();
                let annotation = MethodAnnotation {
                    http: decode_extension::<HttpRule>(&options, &self.http)?,
                    api: decode_extension::<ApiMethod>(&options, &self.api)?,
                };
                if annotation.http.is_some() || annotation.api.is_some() {
                    annotations
                        .methods
                        .insert(format!(".{}", method.full_name()), annotation);
                }
            }
        }

        for message in file.messages() {
            self.collect_rules(&message, &mut annotations)?;
        }

        Ok(annotations)
    }

    fn collect_rules(&self, message: &MessageDescriptor, annotations: &mut Annotations) -> Result<()> {
        for field in message.fields() {
            if let Some(rules) = decode_extension::<FieldRules>(&field.options(), &self.rules)? {
                if !rules.rules.is_empty() {
                    annotations
                        .fields
                        .insert(format!(".{}", field.full_name()), rules.rules);
                }
            }
        }
        for nested in message.child_messages() {
            self.collect_rules(&nested, annotations)?;
        }
        Ok(())
    }
}

fn decode_extension<T: prost::Message + Default>(
    options: &DynamicMessage,
    extension: &Option<ExtensionDescriptor>,
) -> Result<Option<T>> {
    let Some(extension) = extension else {
        return Ok(None);
    };
    if !options.has_extension(extension) {
        return Ok(None);
    }

    match options.get_extension(extension).as_ref() {
        Value::Message(message) => T::decode(message.encode_to_vec().as_slice())
            .map(Some)
            .map_err(|e| {
                GeneratorError::Parse(format!(
                    "Failed to decode option {}: {}",
                    extension.full_name(),
                    e
                ))
            }),
        _ => Ok(None),
    }
}
