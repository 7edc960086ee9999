//! Services, methods and their HTTP bindings

use crate::loader::Annotations;
use crate::registry::Registry;
use crate::template::Template;
use crate::types::{
    qualified_name, Binding, Body, FieldPath, FieldPathComponent, FieldRef, FileId, Method,
    MethodRef, MessageId, Parameter, Service, ServiceDeployment,
};
use ease_gateway_common::options::{http_rule::Pattern, ApiMethod, HttpRule};
use ease_gateway_common::{GeneratorError, Result};
use prost_types::field_descriptor_proto::Type;
use prost_types::{FileDescriptorProto, MethodDescriptorProto, ServiceDescriptorProto};
use tracing::{debug, trace};

/// Builds the services of `file`, resolving request and response types and
/// every HTTP binding against the registry.
pub(crate) fn build_services(
    reg: &Registry,
    file: FileId,
    proto: &FileDescriptorProto,
    annotations: &Annotations,
) -> Result<Vec<Service>> {
    proto
        .service
        .iter()
        .enumerate()
        .map(|(index, service)| build_service(reg, file, index, proto.package(), service, annotations))
        .collect()
}

fn build_service(
    reg: &Registry,
    file: FileId,
    index: usize,
    package: &str,
    proto: &ServiceDescriptorProto,
    annotations: &Annotations,
) -> Result<Service> {
    let fqsn = qualified_name(package, &[], proto.name());
    debug!(service = %fqsn, "building service");

    let deployment = annotations.services.get(&fqsn).map(|spec| ServiceDeployment {
        service_id: spec.service_id.clone(),
        port_name: spec.port_name.clone(),
        namespace: spec.namespace.clone(),
        gen_controller: spec.gen_controller,
        balancer: spec.balancer(),
    });

    let methods = proto
        .method
        .iter()
        .enumerate()
        .map(|(method_index, method)| {
            let method_ref = MethodRef {
                file,
                service: index,
                method: method_index,
            };
            build_method(reg, method_ref, package, &fqsn, proto.name(), method, annotations)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Service {
        file,
        name: proto.name().to_string(),
        deployment,
        methods,
        fqsn,
    })
}

fn build_method(
    reg: &Registry,
    method_ref: MethodRef,
    package: &str,
    fqsn: &str,
    service_name: &str,
    proto: &MethodDescriptorProto,
    annotations: &Annotations,
) -> Result<Method> {
    let fqmn = format!("{}.{}", fqsn, proto.name());
    let request = reg.lookup_message(package, proto.input_type())?;
    let response = reg.lookup_message(package, proto.output_type())?;

    let annotation = annotations.methods.get(&fqmn);
    let api = annotation
        .and_then(|a| a.api.clone())
        .unwrap_or_else(ApiMethod::default);

    let rules = match annotation.and_then(|a| a.http.as_ref()) {
        Some(rule) => {
            let mut rules = vec![rule.clone()];
            rules.extend(rule.additional_bindings.iter().cloned());
            rules
        }
        None if reg.generate_unbound_methods => {
            trace!(method = %fqmn, "binding unannotated method");
            vec![unbound_rule(package, service_name, proto.name())]
        }
        None => Vec::new(),
    };

    let bindings = rules
        .iter()
        .enumerate()
        .map(|(index, rule)| new_binding(reg, method_ref, &fqmn, request, response, rule, index))
        .collect::<Result<Vec<_>>>()?;

    Ok(Method {
        name: proto.name().to_string(),
        service_name: service_name.to_string(),
        request,
        response,
        client_streaming: proto.client_streaming(),
        server_streaming: proto.server_streaming(),
        bindings,
        login_required: api.login_required,
        client_sign_required: api.client_sign_required,
        is_third_party: api.is_third_party,
        api_source: api.api_source(),
        token_type: api.token_type(),
        spec_source: api.spec_source_type(),
        hash_key: api.hash_key.clone(),
        timeout: api.timeout.clone(),
        fqmn,
    })
}

/// `POST /<package>.<Service>/<Method>` with the whole request as body
fn unbound_rule(package: &str, service: &str, method: &str) -> HttpRule {
    let path = if package.is_empty() {
        format!("/{}/{}", service, method)
    } else {
        format!("/{}.{}/{}", package, service, method)
    };
    HttpRule {
        pattern: Some(Pattern::Post(path)),
        body: "*".to_string(),
        ..Default::default()
    }
}

fn new_binding(
    reg: &Registry,
    method: MethodRef,
    fqmn: &str,
    request: MessageId,
    response: MessageId,
    rule: &HttpRule,
    index: usize,
) -> Result<Binding> {
    let invalid = |reason: String| GeneratorError::InvalidBinding {
        method: fqmn.to_string(),
        reason,
    };

    let (http_method, path) = rule
        .verb_and_path()
        .ok_or_else(|| invalid("none of pattern specified".to_string()))?;
    let path_tmpl = Template::parse(path)?;

    match http_method {
        "GET" if !rule.body.is_empty() => {
            return Err(invalid(
                "must not set request body when http method is GET".to_string(),
            ))
        }
        "DELETE" if !rule.body.is_empty() && !reg.allow_delete_body => {
            return Err(invalid(
                "must not set request body when http method is DELETE except allow_delete_body option is true".to_string(),
            ))
        }
        _ => {}
    }

    let path_params = path_tmpl
        .fields
        .iter()
        .map(|name| {
            let field_path = resolve_field_path(reg, request, name, true)?;
            let target = field_path
                .components()
                .last()
                .map(|c| c.target)
                .ok_or_else(|| invalid(format!("empty path parameter in {}", path)))?;
            Ok(Parameter {
                field_path,
                target,
                method,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let body = match rule.body.as_str() {
        "" => None,
        "*" => Some(Body {
            field_path: FieldPath::default(),
        }),
        name => Some(Body {
            field_path: resolve_field_path(reg, request, name, false)?,
        }),
    };

    // The generated accessor reads the response without a type switch.
    let response_body = match rule.response_body.as_str() {
        "" => None,
        name => {
            let field_path = resolve_field_path(reg, response, name, false)?;
            if field_path
                .components()
                .iter()
                .any(|c| reg.field(c.target).oneof_index.is_some())
            {
                return Err(invalid(format!(
                    "response_body {} must not go through a oneof",
                    name
                )));
            }
            Some(Body { field_path })
        }
    };

    Ok(Binding {
        method,
        index,
        path_tmpl,
        http_method: http_method.to_string(),
        path_params,
        body,
        response_body,
    })
}

/// Resolves a dotted field path such as `book.author.name` from `root`.
///
/// Every component but the last must be a message-typed field. Path
/// parameters may not traverse repeated fields.
pub fn resolve_field_path(
    reg: &Registry,
    root: MessageId,
    path: &str,
    is_path_param: bool,
) -> Result<FieldPath> {
    if path.is_empty() {
        return Ok(FieldPath::default());
    }

    let invalid = |reason: String| GeneratorError::InvalidFieldPath {
        path: path.to_string(),
        reason,
    };

    let segments = path.split('.').collect::<Vec<_>>();
    let mut current = root;
    let mut components = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let message = reg.message(current);
        let index = message
            .field_index(segment)
            .ok_or_else(|| GeneratorError::FieldNotFound {
                field: segment.to_string(),
                message: message.fqmn().to_string(),
            })?;
        let field = &message.fields[index];
        components.push(FieldPathComponent {
            name: segment.to_string(),
            target: FieldRef {
                message: current,
                index,
            },
        });

        if i + 1 == segments.len() {
            break;
        }
        if is_path_param && field.is_repeated() {
            return Err(invalid(format!(
                "repeated field not allowed in field path: {}",
                segment
            )));
        }
        current = match (field.r#type, field.field_message) {
            (_, Some(next)) => next,
            (Type::Message | Type::Group, None) => {
                reg.lookup_message(message.fqmn(), &field.type_name)?
            }
            _ => {
                return Err(invalid(format!(
                    "{} is a non-message field in {}",
                    segment,
                    message.fqmn()
                )))
            }
        };
    }

    Ok(FieldPath(components))
}
