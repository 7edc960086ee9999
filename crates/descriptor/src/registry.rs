//! Symbol table for one generator run
//!
//! The registry owns every loaded file, message and enum, indexes them by
//! fully qualified name and hands out the Go package aliases used by the
//! generated code. It is populated once with [`Registry::load`] before any
//! binding or validation resolution happens.

use crate::loader::{Annotations, SourceFile};
use crate::services;
use crate::types::{
    qualified_name, Enum, EnumId, Field, FieldRef, File, FileId, GoPackage, Message, MessageId,
    Method, MethodRef, Rule, Syntax,
};
use ease_gateway_common::options::ValidationRule;
use ease_gateway_common::{GeneratorError, Result};
use prost_types::field_descriptor_proto::Type;
use prost_types::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Registry of all messages, enums and services of one run
#[derive(Debug, Default)]
pub struct Registry {
    files: Vec<File>,
    file_index: HashMap<String, FileId>,
    messages: Vec<Message>,
    message_index: HashMap<String, MessageId>,
    enums: Vec<Enum>,
    enum_index: HashMap<String, EnumId>,

    /// Go package alias → import path
    pkg_aliases: HashMap<String, String>,
    /// Proto file name → Go import path (`M` parameters)
    pkg_map: HashMap<String, String>,
    /// Prefix for Go import paths derived from file locations
    prefix: String,

    pub(crate) allow_delete_body: bool,
    pub(crate) generate_unbound_methods: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    /// Maps a proto file to the Go package its code is generated into
    pub fn add_pkg_map(&mut self, file: impl Into<String>, go_package: impl Into<String>) {
        self.pkg_map.insert(file.into(), go_package.into());
    }

    pub fn set_allow_delete_body(&mut self, allow: bool) {
        self.allow_delete_body = allow;
    }

    /// Bind methods without an HTTP rule to `POST /<package>.<Service>/<Method>`
    pub fn set_generate_unbound_methods(&mut self, generate: bool) {
        self.generate_unbound_methods = generate;
    }

    /// Reserves `alias` for the Go package at `path`.
    ///
    /// Fails if the alias is already bound to a different path. Reserving
    /// the same alias for the same path again is a no-op.
    pub fn reserve_go_package_alias(&mut self, alias: &str, path: &str) -> Result<()> {
        if let Some(taken) = self.pkg_aliases.get(alias) {
            if taken == path {
                return Ok(());
            }
            return Err(GeneratorError::AliasTaken {
                alias: alias.to_string(),
            });
        }
        self.pkg_aliases.insert(alias.to_string(), path.to_string());
        Ok(())
    }

    /// Reserves the package name, falling back to `name_0`, `name_1`, ...
    /// Returns the alias to use, or `None` when the plain name was free.
    pub fn reserve_unique_alias(&mut self, name: &str, path: &str) -> Option<String> {
        if self.reserve_go_package_alias(name, path).is_ok() {
            return None;
        }
        (0..)
            .map(|i| format!("{}_{}", name, i))
            .find(|alias| self.reserve_go_package_alias(alias, path).is_ok())
    }

    /// Loads all files of the request. Type references across files are
    /// resolved after every file has been registered.
    pub fn load(&mut self, files: Vec<SourceFile>) -> Result<()> {
        let mut pending = Vec::with_capacity(files.len());
        for source in files {
            let file_id = self.register_file(&source.proto, &source.annotations);
            pending.push((file_id, source));
        }

        self.resolve_field_messages();

        for (file_id, source) in &pending {
            let services = services::build_services(self, *file_id, &source.proto, &source.annotations)?;
            self.files[file_id.0].services = services;
        }

        Ok(())
    }

    fn register_file(&mut self, proto: &FileDescriptorProto, annotations: &Annotations) -> FileId {
        let file_id = FileId(self.files.len());
        let name = proto.name().to_string();

        let mut go_pkg = GoPackage::new(self.go_package_path(proto), default_go_package_name(proto));
        go_pkg.alias = self.reserve_unique_alias(&go_pkg.name, &go_pkg.path);
        debug!(file = %name, go_package = %go_pkg, "registering file");

        self.files.push(File {
            name: name.clone(),
            package: proto.package().to_string(),
            syntax: Syntax::from_proto(proto.syntax.as_deref()),
            go_pkg,
            messages: Vec::new(),
            enums: Vec::new(),
            services: Vec::new(),
        });
        self.file_index.insert(name, file_id);

        for (index, message) in proto.message_type.iter().enumerate() {
            self.register_message(file_id, proto, &[], message, index, annotations);
        }
        for (index, enum_type) in proto.enum_type.iter().enumerate() {
            self.register_enum(file_id, proto, &[], enum_type, index);
        }

        file_id
    }

    fn register_message(
        &mut self,
        file_id: FileId,
        file: &FileDescriptorProto,
        outers: &[String],
        proto: &DescriptorProto,
        index: usize,
        annotations: &Annotations,
    ) {
        let id = MessageId(self.messages.len());
        let package = file.package().to_string();
        let fqmn = qualified_name(&package, outers, proto.name());
        trace!(%fqmn, "registering message");

        let fields = proto
            .field
            .iter()
            .map(|field| {
                let field_fqn = format!("{}.{}", fqmn, field.name());
                let rules = annotations
                    .fields
                    .get(&field_fqn)
                    .map(|rules| rules.iter().map(Rule::from).collect())
                    .unwrap_or_default();
                Field {
                    message: id,
                    name: field.name().to_string(),
                    number: field.number(),
                    label: field.label(),
                    r#type: field.r#type(),
                    type_name: field.type_name().to_string(),
                    // Synthetic oneofs of proto3 `optional` fields are not
                    // real oneof groups in the generated Go code.
                    oneof_index: if field.proto3_optional() {
                        None
                    } else {
                        field.oneof_index.map(|i| i as usize)
                    },
                    field_message: None,
                    rules,
                }
            })
            .collect();

        self.messages.push(Message {
            file: file_id,
            package,
            syntax: Syntax::from_proto(file.syntax.as_deref()),
            outers: outers.to_vec(),
            name: proto.name().to_string(),
            fields,
            oneof_decls: proto.oneof_decl.iter().map(|d| d.name().to_string()).collect(),
            index,
            fqmn: fqmn.clone(),
        });
        self.message_index.insert(fqmn, id);
        self.files[file_id.0].messages.push(id);

        let mut nested_outers = outers.to_vec();
        nested_outers.push(proto.name().to_string());
        for (nested_index, nested) in proto.nested_type.iter().enumerate() {
            self.register_message(file_id, file, &nested_outers, nested, nested_index, annotations);
        }
        for (nested_index, enum_type) in proto.enum_type.iter().enumerate() {
            self.register_enum(file_id, file, &nested_outers, enum_type, nested_index);
        }
    }

    fn register_enum(
        &mut self,
        file_id: FileId,
        file: &FileDescriptorProto,
        outers: &[String],
        proto: &EnumDescriptorProto,
        index: usize,
    ) {
        let id = EnumId(self.enums.len());
        let fqen = qualified_name(file.package(), outers, proto.name());
        self.enums.push(Enum {
            file: file_id,
            outers: outers.to_vec(),
            name: proto.name().to_string(),
            index,
        });
        self.enum_index.insert(fqen, id);
        self.files[file_id.0].enums.push(id);
    }

    /// Links message-typed fields to their message. References to types
    /// outside the loaded files stay unresolved.
    fn resolve_field_messages(&mut self) {
        let mut links = Vec::new();
        for (msg_index, message) in self.messages.iter().enumerate() {
            for (field_index, field) in message.fields.iter().enumerate() {
                if field.r#type != Type::Message && field.r#type != Type::Group {
                    continue;
                }
                match self.lookup_message(message.fqmn(), &field.type_name) {
                    Ok(target) => links.push((msg_index, field_index, target)),
                    Err(err) => debug!(field = %field.name, %err, "unresolved field type"),
                }
            }
        }
        for (msg_index, field_index, target) in links {
            self.messages[msg_index].fields[field_index].field_message = Some(target);
        }
    }

    /// Looks up a message by name as seen from `location`.
    ///
    /// A name with a leading dot is fully qualified. Otherwise the name is
    /// searched in the scope of `location` and then in each enclosing scope.
    pub fn lookup_message(&self, location: &str, name: &str) -> Result<MessageId> {
        trace!(%name, %location, "lookup message");
        lookup_scoped(&self.message_index, location, name)
            .ok_or_else(|| GeneratorError::MessageNotFound(name.to_string()))
    }

    /// Looks up an enum by name as seen from `location`
    pub fn lookup_enum(&self, location: &str, name: &str) -> Result<EnumId> {
        trace!(%name, %location, "lookup enum");
        lookup_scoped(&self.enum_index, location, name)
            .ok_or_else(|| GeneratorError::EnumNotFound(name.to_string()))
    }

    pub fn lookup_file(&self, name: &str) -> Result<FileId> {
        self.file_index
            .get(name)
            .copied()
            .ok_or_else(|| GeneratorError::Parse(format!("no such file given: {}", name)))
    }

    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.0]
    }

    pub fn message(&self, id: MessageId) -> &Message {
        &self.messages[id.0]
    }

    pub fn enum_type(&self, id: EnumId) -> &Enum {
        &self.enums[id.0]
    }

    pub fn field(&self, field: FieldRef) -> &Field {
        &self.messages[field.message.0].fields[field.index]
    }

    pub fn method(&self, method: MethodRef) -> &Method {
        &self.files[method.file.0].services[method.service].methods[method.method]
    }

    /// Go package of the file declaring `message`
    pub fn message_go_package(&self, message: MessageId) -> &GoPackage {
        &self.file(self.message(message).file).go_pkg
    }

    pub fn files(&self) -> impl Iterator<Item = (FileId, &File)> {
        self.files.iter().enumerate().map(|(i, f)| (FileId(i), f))
    }

    /// Go import path for the code generated from `file`
    fn go_package_path(&self, file: &FileDescriptorProto) -> String {
        if let Some(pkg) = self.pkg_map.get(file.name()) {
            return join_path(&self.prefix, pkg);
        }

        let go_package = file
            .options
            .as_ref()
            .map(|o| o.go_package())
            .unwrap_or_default();
        if go_package.contains('/') {
            return match go_package.split_once(';') {
                Some((path, _)) => path.to_string(),
                None => go_package.to_string(),
            };
        }

        let dir = match file.name().rsplit_once('/') {
            Some((dir, _)) => dir,
            None => ".",
        };
        join_path(&self.prefix, dir)
    }
}

impl From<&ValidationRule> for Rule {
    fn from(rule: &ValidationRule) -> Self {
        use ease_gateway_common::options::FunctionType;

        Rule {
            operator: rule.operator(),
            value: rule.value.clone(),
            value_type: rule.r#type(),
            trim: rule.function() == FunctionType::Trim,
        }
    }
}

fn lookup_scoped<T: Copy>(index: &HashMap<String, T>, location: &str, name: &str) -> Option<T> {
    if name.starts_with('.') {
        return index.get(name).copied();
    }

    let location = location.strip_prefix('.').unwrap_or(location);
    let mut components: Vec<&str> = if location.is_empty() {
        Vec::new()
    } else {
        location.split('.').collect()
    };

    loop {
        let mut candidate = String::new();
        for component in &components {
            candidate.push('.');
            candidate.push_str(component);
        }
        candidate.push('.');
        candidate.push_str(name);

        if let Some(found) = index.get(&candidate) {
            return Some(*found);
        }
        if components.pop().is_none() {
            return None;
        }
    }
}

/// Go package name for a file: explicit `;name`, the last element of the
/// `go_package` path, the sanitized proto package or the file stem.
fn default_go_package_name(file: &FileDescriptorProto) -> String {
    let go_package = file
        .options
        .as_ref()
        .map(|o| o.go_package())
        .unwrap_or_default();

    if let Some((_, name)) = go_package.split_once(';') {
        return sanitize_package_name(name);
    }
    if !go_package.is_empty() {
        let base = go_package.rsplit('/').next().unwrap_or(go_package);
        return sanitize_package_name(base);
    }
    if !file.package().is_empty() {
        return sanitize_package_name(file.package());
    }

    let base = file.name().rsplit('/').next().unwrap_or_default();
    let stem = base.strip_suffix(".proto").unwrap_or(base);
    sanitize_package_name(stem)
}

fn sanitize_package_name(name: &str) -> String {
    name.replace(['.', '-'], "_")
}

fn join_path(prefix: &str, path: &str) -> String {
    let path = path.trim_matches('/');
    match (prefix.trim_end_matches('/'), path) {
        ("", "" | ".") => ".".to_string(),
        ("", path) => path.to_string(),
        (prefix, "" | ".") => prefix.to_string(),
        (prefix, path) => format!("{}/{}", prefix, path),
    }
}
