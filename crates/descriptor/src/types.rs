//! Descriptor model
//!
//! The graph of files, messages, enums, services, methods and bindings
//! built by the [`Registry`](crate::Registry). Entities refer to each
//! other by id; the registry resolves ids to entities, so cycles in the
//! message graph need no special ownership handling.

use crate::casing::camel;
use crate::template::Template;
use ease_gateway_common::options::{
    ApiSourceType, AuthTokenType, LoadBalancer, OperatorType, SpecSourceType, ValueType,
};
use prost_types::field_descriptor_proto::{Label, Type};
use serde::Serialize;
use std::fmt;

/// Index of a [`File`] in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub(crate) usize);

/// Index of a [`Message`] in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub(crate) usize);

/// Index of an [`Enum`] in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub(crate) usize);

/// Location of a [`Field`]: its owning message and position in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub message: MessageId,
    pub index: usize,
}

/// Location of a [`Method`]: file, service position, method position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub file: FileId,
    pub service: usize,
    pub method: usize,
}

/// A Go package that generated code lives in or imports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GoPackage {
    /// Import path of the package
    pub path: String,
    /// Declared package name
    pub name: String,
    /// Alias unique within the current run, if the name collided
    pub alias: Option<String>,
}

impl GoPackage {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            alias: None,
        }
    }

    /// Whether the import is a Go standard library package
    pub fn standard(&self) -> bool {
        !self.path.contains('.')
    }

    /// Identifier to qualify names from this package with
    pub fn pkg(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for GoPackage {
    /// Renders the package as a Go import line
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} {:?}", alias, self.path),
            None => write!(f, "{:?}", self.path),
        }
    }
}

/// Proto syntax of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Syntax {
    Proto2,
    Proto3,
    Editions,
}

impl Syntax {
    /// A missing syntax statement means proto2
    pub fn from_proto(syntax: Option<&str>) -> Self {
        match syntax {
            None | Some("") | Some("proto2") => Syntax::Proto2,
            Some("proto3") => Syntax::Proto3,
            Some(_) => Syntax::Editions,
        }
    }
}

/// One compiled `.proto` file
#[derive(Debug, Clone)]
pub struct File {
    /// Path of the file as given to protoc
    pub name: String,
    /// Proto package, empty if none is declared
    pub package: String,
    pub syntax: Syntax,
    pub go_pkg: GoPackage,
    pub messages: Vec<MessageId>,
    pub enums: Vec<EnumId>,
    pub services: Vec<Service>,
}

impl File {
    pub fn is_proto2(&self) -> bool {
        self.syntax == Syntax::Proto2
    }

    /// Whether any service has at least one HTTP binding
    pub fn has_bindings(&self) -> bool {
        self.services
            .iter()
            .any(|svc| svc.methods.iter().any(|m| !m.bindings.is_empty()))
    }
}

/// Joins `.package.outer.name`
pub(crate) fn qualified_name(package: &str, outers: &[String], name: &str) -> String {
    let mut fq = String::new();
    if !package.is_empty() {
        fq.push('.');
        fq.push_str(package);
    }
    for outer in outers {
        fq.push('.');
        fq.push_str(outer);
    }
    fq.push('.');
    fq.push_str(name);
    fq
}

/// Go type name for a (possibly nested) type, qualified when it lives in
/// another Go package than `current_package`.
pub(crate) fn go_type_name(
    go_pkg: &GoPackage,
    outers: &[String],
    name: &str,
    current_package: &str,
) -> String {
    let mut local = outers.join("_");
    if !local.is_empty() {
        local.push('_');
    }
    local.push_str(name);

    if go_pkg.path == current_package {
        local
    } else {
        format!("{}.{}", go_pkg.pkg(), local)
    }
}

/// A protocol buffer message type
#[derive(Debug, Clone)]
pub struct Message {
    pub file: FileId,
    /// Proto package of the declaring file
    pub package: String,
    /// Syntax of the declaring file
    pub syntax: Syntax,
    /// Enclosing messages, outermost first, if this is a nested type
    pub outers: Vec<String>,
    pub name: String,
    pub fields: Vec<Field>,
    /// Names of the oneof declarations, indexed by `Field::oneof_index`
    pub oneof_decls: Vec<String>,
    /// Position of the message within its parent (file or message)
    pub index: usize,
    pub(crate) fqmn: String,
}

impl Message {
    /// Fully qualified message name, with a leading dot
    pub fn fqmn(&self) -> &str {
        &self.fqmn
    }

    /// FQMN flattened into an identifier
    pub fn go_name(&self) -> String {
        self.fqmn.replace('.', "_")
    }

    /// Go type of the message as seen from `current_package`
    pub fn go_type(&self, go_pkg: &GoPackage, current_package: &str) -> String {
        go_type_name(go_pkg, &self.outers, &self.name, current_package)
    }

    /// Name of the generated validation function for this message
    pub fn validation_method_name(&self) -> String {
        let mut components = self.outers.clone();
        components.push(format!("Validate_{}", self.go_name()));
        components.join("_")
    }

    /// Validation function name, qualified with the package alias when the
    /// message lives outside `current_package`
    pub fn validation_method_qualified_name(
        &self,
        go_pkg: &GoPackage,
        current_package: &str,
    ) -> String {
        let name = self.validation_method_name();
        if go_pkg.path == current_package {
            name
        } else {
            format!("{}.{}", go_pkg.pkg(), name)
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// CamelCase name of the oneof declaration `field` belongs to
    pub fn oneof_decl_go_name(&self, field: &Field) -> Option<String> {
        let decl = self.oneof_decls.get(field.oneof_index?)?;
        Some(camel(decl))
    }
}

/// A protocol buffer enum type
#[derive(Debug, Clone)]
pub struct Enum {
    pub file: FileId,
    pub outers: Vec<String>,
    pub name: String,
    pub index: usize,
}

impl Enum {
    pub fn go_type(&self, go_pkg: &GoPackage, current_package: &str) -> String {
        go_type_name(go_pkg, &self.outers, &self.name, current_package)
    }
}

/// A message field
#[derive(Debug, Clone)]
pub struct Field {
    /// The message this field belongs to
    pub message: MessageId,
    pub name: String,
    pub number: i32,
    pub label: Label,
    pub r#type: Type,
    /// Referenced type name for message and enum fields, as written in
    /// the descriptor (usually package qualified with a leading dot)
    pub type_name: String,
    pub oneof_index: Option<usize>,
    /// The message type of the field, when it resolves to a loaded message
    pub field_message: Option<MessageId>,
    pub rules: Vec<Rule>,
}

impl Field {
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn has_rule(&self) -> bool {
        !self.rules.is_empty()
    }
}

/// One validation constraint on a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub operator: OperatorType,
    pub value: String,
    pub value_type: ValueType,
    /// Trim the value before validating it
    pub trim: bool,
}

impl Rule {
    /// Whether the rule bounds a length rather than a value
    pub fn is_length(&self) -> bool {
        matches!(
            self.operator,
            OperatorType::LenEq | OperatorType::LenGt | OperatorType::LenLt
        )
    }
}

/// Routing identity and balancing policy of a service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDeployment {
    pub service_id: String,
    pub port_name: String,
    pub namespace: String,
    pub gen_controller: bool,
    pub balancer: LoadBalancer,
}

/// A protocol buffer service
#[derive(Debug, Clone)]
pub struct Service {
    pub file: FileId,
    pub name: String,
    /// Deployment metadata, when the service carries the option
    pub deployment: Option<ServiceDeployment>,
    pub methods: Vec<Method>,
    pub(crate) fqsn: String,
}

impl Service {
    /// Fully qualified service name, with a leading dot
    pub fn fqsn(&self) -> &str {
        &self.fqsn
    }

    pub fn client_constructor_name(&self) -> String {
        format!("New{}Client", self.name)
    }
}

/// An RPC method
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub service_name: String,
    pub request: MessageId,
    pub response: MessageId,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub bindings: Vec<Binding>,

    pub login_required: bool,
    pub client_sign_required: bool,
    pub is_third_party: bool,
    pub api_source: ApiSourceType,
    pub token_type: AuthTokenType,
    pub spec_source: SpecSourceType,
    pub hash_key: String,
    pub timeout: String,
    pub(crate) fqmn: String,
}

impl Method {
    /// Fully qualified method name: `.package.Service.Method`
    pub fn fqmn(&self) -> &str {
        &self.fqmn
    }
}

/// How an HTTP endpoint is bound to a gRPC method
#[derive(Debug, Clone)]
pub struct Binding {
    pub method: MethodRef,
    /// Zero-origin index of the binding within the method
    pub index: usize,
    pub path_tmpl: Template,
    pub http_method: String,
    pub path_params: Vec<Parameter>,
    pub body: Option<Body>,
    pub response_body: Option<Body>,
}

impl Binding {
    /// Field paths bound explicitly by the body and the path parameters
    pub fn explicit_params(&self) -> Vec<String> {
        let mut result = Vec::new();
        if let Some(body) = &self.body {
            result.push(body.field_path.to_string());
        }
        for param in &self.path_params {
            result.push(param.field_path.to_string());
        }
        result
    }
}

/// A parameter provided in the HTTP request path
#[derive(Debug, Clone)]
pub struct Parameter {
    pub field_path: FieldPath,
    pub target: FieldRef,
    pub method: MethodRef,
}

/// Request or response body mapping. An empty field path maps the body to
/// the whole message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub field_path: FieldPath,
}

/// Path to a field from a root message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(pub Vec<FieldPathComponent>);

/// One step of a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPathComponent {
    /// Name of the proto field
    pub name: String,
    pub target: FieldRef,
}

impl FieldPath {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn components(&self) -> &[FieldPathComponent] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&component.name)?;
        }
        Ok(())
    }
}
