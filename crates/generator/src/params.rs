//! Emission bundle
//!
//! Serializable views of one target file with every expression already
//! resolved, so an emitter only has to lay out text.

use crate::config::GeneratorConfig;
use crate::render;
use ease_gateway_common::{GeneratorError, Result};
use ease_gateway_descriptor::{
    Binding, Body, FileId, GoPackage, Method, MethodRef, Parameter, Registry, RuleAnalyzer,
    Service,
};
use serde::Serialize;

/// Root expression of the request message in generated handlers
const REQUEST_VAR: &str = "protoReq";

const FIELD_MASK: &str = ".google.protobuf.FieldMask";

/// Everything an emitter needs to generate one gateway file
#[derive(Debug, Clone, Serialize)]
pub struct GatewayParams {
    pub file: FileView,
    pub imports: Vec<ImportView>,
    pub use_request_context: bool,
    pub register_func_suffix: String,
    pub allow_patch_feature: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    pub name: String,
    pub package: String,
    pub go_package: GoPackage,
    pub services: Vec<ServiceView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportView {
    pub path: String,
    pub alias: Option<String>,
    /// Identifier the file refers to the package by
    pub pkg: String,
    pub standard: bool,
    /// The Go import line
    pub line: String,
}

impl From<&GoPackage> for ImportView {
    fn from(pkg: &GoPackage) -> Self {
        Self {
            path: pkg.path.clone(),
            alias: pkg.alias.clone(),
            pkg: pkg.pkg().to_string(),
            standard: pkg.standard(),
            line: pkg.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    pub name: String,
    pub fqsn: String,
    pub client_constructor: String,
    pub deployment: Option<DeploymentView>,
    pub methods: Vec<MethodView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentView {
    pub service_id: String,
    pub port_name: String,
    pub namespace: String,
    pub gen_controller: bool,
    pub balancer: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodView {
    pub name: String,
    pub fqmn: String,
    pub request_type: String,
    pub response_type: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub login_required: bool,
    pub client_sign_required: bool,
    pub is_third_party: bool,
    pub api_source: &'static str,
    pub token_type: &'static str,
    pub spec_source: &'static str,
    pub hash_key: String,
    pub timeout: String,
    /// Validation function to call on the request, if it has rules
    pub validation: Option<String>,
    /// Validation functions of the request's message fields that have rules
    pub field_validations: Vec<String>,
    pub bindings: Vec<BindingView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingView {
    pub index: usize,
    pub http_method: String,
    pub path_template: String,
    pub verb: Option<String>,
    pub path_params: Vec<ParamView>,
    pub body: Option<BodyView>,
    pub response_body: Option<BodyView>,
    /// Field paths set explicitly by the body and path
    pub explicit_params: Vec<String>,
    /// Whether fields outside body and path come from the query string
    pub query_params: bool,
    /// Populate `update_mask` from the body fields
    pub update_mask: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamView {
    pub field_path: String,
    pub convert_func: &'static str,
    pub is_enum: bool,
    pub is_repeated: bool,
    pub is_proto2: bool,
    pub is_nested_proto3: bool,
    /// Go type of the enum, for enum parameters
    pub enum_type: Option<String>,
    pub guards: Vec<String>,
    pub target: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BodyView {
    pub field_path: String,
    pub guards: Vec<String>,
    pub target: String,
}

/// Assembles the bundle of `file`. Files without a bound method yield
/// [`GeneratorError::NoTargetService`].
pub fn build(
    reg: &Registry,
    analyzer: &mut RuleAnalyzer,
    config: &GeneratorConfig,
    file_id: FileId,
    imports: &[GoPackage],
) -> Result<GatewayParams> {
    let file = reg.file(file_id);
    if !file.has_bindings() {
        return Err(GeneratorError::NoTargetService);
    }

    let current = file.go_pkg.path.as_str();
    let services = file
        .services
        .iter()
        .enumerate()
        .map(|(index, service)| service_view(reg, analyzer, current, file_id, index, service))
        .collect::<Result<Vec<_>>>()?;

    Ok(GatewayParams {
        file: FileView {
            name: file.name.clone(),
            package: file.package.clone(),
            go_package: file.go_pkg.clone(),
            services,
        },
        imports: imports.iter().map(ImportView::from).collect(),
        use_request_context: config.use_request_context,
        register_func_suffix: config.register_func_suffix.clone(),
        allow_patch_feature: config.allow_patch_feature,
    })
}

fn service_view(
    reg: &Registry,
    analyzer: &mut RuleAnalyzer,
    current: &str,
    file: FileId,
    index: usize,
    service: &Service,
) -> Result<ServiceView> {
    let methods = service
        .methods
        .iter()
        .enumerate()
        .map(|(method_index, method)| {
            let method_ref = MethodRef {
                file,
                service: index,
                method: method_index,
            };
            method_view(reg, analyzer, current, method_ref, method)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ServiceView {
        name: service.name.clone(),
        fqsn: service.fqsn().to_string(),
        client_constructor: service.client_constructor_name(),
        deployment: service.deployment.as_ref().map(|d| DeploymentView {
            service_id: d.service_id.clone(),
            port_name: d.port_name.clone(),
            namespace: d.namespace.clone(),
            gen_controller: d.gen_controller,
            balancer: d.balancer.as_str_name(),
        }),
        methods,
    })
}

fn method_view(
    reg: &Registry,
    analyzer: &mut RuleAnalyzer,
    current: &str,
    method_ref: MethodRef,
    method: &Method,
) -> Result<MethodView> {
    let request = reg.message(method.request);
    let response = reg.message(method.response);
    let request_pkg = reg.message_go_package(method.request);

    let validation = analyzer
        .has_rule(reg, method.request)
        .then(|| request.validation_method_qualified_name(request_pkg, current));

    let mut field_validations = Vec::new();
    if validation.is_some() {
        for field in &request.fields {
            let Some(referenced) = field.field_message else {
                continue;
            };
            if !analyzer.has_rule(reg, referenced) {
                continue;
            }
            let name = reg
                .message(referenced)
                .validation_method_qualified_name(reg.message_go_package(referenced), current);
            if !field_validations.contains(&name) {
                field_validations.push(name);
            }
        }
    }

    let bindings = method
        .bindings
        .iter()
        .map(|binding| binding_view(reg, current, method_ref, binding))
        .collect::<Result<Vec<_>>>()?;

    Ok(MethodView {
        name: method.name.clone(),
        fqmn: method.fqmn().to_string(),
        request_type: request.go_type(request_pkg, current),
        response_type: response.go_type(reg.message_go_package(method.response), current),
        client_streaming: method.client_streaming,
        server_streaming: method.server_streaming,
        login_required: method.login_required,
        client_sign_required: method.client_sign_required,
        is_third_party: method.is_third_party,
        api_source: method.api_source.as_str_name(),
        token_type: method.token_type.as_str_name(),
        spec_source: method.spec_source.as_str_name(),
        hash_key: method.hash_key.clone(),
        timeout: method.timeout.clone(),
        validation,
        field_validations,
        bindings,
    })
}

fn binding_view(
    reg: &Registry,
    current: &str,
    method: MethodRef,
    binding: &Binding,
) -> Result<BindingView> {
    let path_params = binding
        .path_params
        .iter()
        .map(|param| param_view(reg, current, param))
        .collect::<Result<Vec<_>>>()?;

    let body_view = |body: &Body| {
        let (guards, target) =
            render::assignable(&body.assignable_expr(reg, REQUEST_VAR, current, method));
        BodyView {
            field_path: body.field_path.to_string(),
            guards,
            target,
        }
    };

    Ok(BindingView {
        index: binding.index,
        http_method: binding.http_method.clone(),
        path_template: binding.path_tmpl.template.clone(),
        verb: binding.path_tmpl.verb.clone(),
        path_params,
        body: binding.body.as_ref().map(body_view),
        response_body: binding.response_body.as_ref().map(|body| BodyView {
            field_path: body.field_path.to_string(),
            guards: Vec::new(),
            target: render::access(
                &body
                    .assignable_expr(reg, "response", current, method)
                    .target,
            ),
        }),
        explicit_params: binding.explicit_params(),
        query_params: binding
            .body
            .as_ref()
            .map_or(true, |body| !body.field_path.is_empty()),
        update_mask: has_update_mask(reg, binding),
    })
}

fn param_view(reg: &Registry, current: &str, param: &Parameter) -> Result<ParamView> {
    let convert_func = param.convert_func_expr(reg)?;
    let is_enum = param.is_enum(reg);
    let enum_type = if is_enum {
        let field = reg.field(param.target);
        reg.lookup_enum("", &field.type_name).ok().map(|id| {
            let enum_type = reg.enum_type(id);
            enum_type.go_type(&reg.file(enum_type.file).go_pkg, current)
        })
    } else {
        None
    };

    let (guards, target) = render::assignable(&param.field_path.assignable_expr(
        reg,
        REQUEST_VAR,
        current,
        param.method,
    ));

    Ok(ParamView {
        field_path: param.field_path.to_string(),
        convert_func,
        is_enum,
        is_repeated: param.is_repeated(reg),
        is_proto2: param.is_proto2(reg),
        is_nested_proto3: param.field_path.is_nested_proto3(reg),
        enum_type,
        guards,
        target,
    })
}

/// PATCH with a body into a request that carries an `update_mask`
fn has_update_mask(reg: &Registry, binding: &Binding) -> bool {
    if binding.http_method != "PATCH" {
        return false;
    }
    let Some(body) = &binding.body else {
        return false;
    };
    if body.field_path.is_empty() {
        return false;
    }

    let request = reg.message(reg.method(binding.method).request);
    request
        .fields
        .iter()
        .any(|f| f.name == "update_mask" && f.type_name == FIELD_MASK)
}
