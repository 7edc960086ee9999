//! Descriptor registry and HTTP binding resolver
//!
//! This crate turns the file descriptors of a protoc run into a resolved
//! binding model: every HTTP endpoint, the RPC method it maps to, the
//! typed field paths of its path and body parameters, and whether its
//! request needs validation code.
//!
//! ## Resolution
//!
//! - [`loader`] decodes descriptors and the `ease.api` option extensions
//! - [`Registry::load`] indexes all files, then builds services and bindings
//! - [`RuleAnalyzer`] answers which messages carry validation rules
//! - [`FieldPath::assignable_expr`] produces the oneof-aware assignment IR
//! - [`Parameter::convert_func_expr`] picks the string converter of a path
//!   parameter

pub mod casing;
mod convert;
mod expr;
pub mod loader;
mod registry;
mod services;
mod template;
mod types;
mod validation;

pub use convert::{convert_func, is_well_known_type};
pub use expr::{Access, AccessStep, AssignableExpr, OneofGuard};
pub use loader::{decode_descriptor_set, decode_request, Annotations, MethodAnnotation, Request, SourceFile};
pub use registry::Registry;
pub use services::resolve_field_path;
pub use template::Template;
pub use types::{
    Binding, Body, Enum, EnumId, Field, FieldPath, FieldPathComponent, FieldRef, File, FileId,
    GoPackage, Message, MessageId, Method, MethodRef, Parameter, Rule, Service,
    ServiceDeployment, Syntax,
};
pub use validation::RuleAnalyzer;
