//! Service registration for generated gateway handlers
//!
//! Generated files register their services and HTTP methods here at start
//! up. Services that share a deployment [`ServiceSpec`] form one
//! [`ServiceGroup`], which carries the enable/disable callbacks of the
//! underlying connection.

use ease_gateway_common::options::{ApiSourceType, AuthTokenType, LoadBalancer, ServiceSpec, SpecSourceType};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while registering methods
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("no service group registered for {0}")]
    UnknownGroup(SpecKey),

    #[error("no service {service} registered in group {group}")]
    UnknownService { group: SpecKey, service: String },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Group level enable/disable hook
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Identity of a [`ServiceSpec`]; two specs with equal fields share a group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecKey {
    pub service_id: String,
    pub namespace: String,
    pub port_name: String,
    pub gen_controller: bool,
    pub balancer: i32,
}

impl From<&ServiceSpec> for SpecKey {
    fn from(spec: &ServiceSpec) -> Self {
        Self {
            service_id: spec.service_id.clone(),
            namespace: spec.namespace.clone(),
            port_name: spec.port_name.clone(),
            gen_controller: spec.gen_controller,
            balancer: spec.balancer,
        }
    }
}

impl fmt::Display for SpecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let balancer = LoadBalancer::try_from(self.balancer)
            .map(|b| b.as_str_name())
            .unwrap_or("UNKNOWN");
        write!(
            f,
            "{}/{}:{} ({})",
            self.namespace, self.service_id, self.port_name, balancer
        )
    }
}

/// An HTTP method of a registered service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub path: String,
    pub http_method: String,
    pub enabled: bool,
    pub login_required: bool,
    pub client_sign_required: bool,
    pub is_third_party: bool,
    pub spec_source: SpecSourceType,
    pub api_source: ApiSourceType,
    pub token_type: AuthTokenType,
    pub timeout: String,
}

/// Method as declared by generated code, with sources given by enum name
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodDecl<'a> {
    pub name: &'a str,
    pub path: &'a str,
    pub http_method: &'a str,
    pub login_required: bool,
    pub client_sign_required: bool,
    pub is_third_party: bool,
    pub spec_source: &'a str,
    pub api_source: &'a str,
    pub token_type: &'a str,
    pub timeout: &'a str,
}

impl From<MethodDecl<'_>> for Method {
    /// Unknown source names fall back to the zero value of their enum.
    fn from(decl: MethodDecl<'_>) -> Self {
        Self {
            name: decl.name.to_string(),
            path: decl.path.to_string(),
            http_method: decl.http_method.to_string(),
            enabled: false,
            login_required: decl.login_required,
            client_sign_required: decl.client_sign_required,
            is_third_party: decl.is_third_party,
            spec_source: SpecSourceType::from_str_name(decl.spec_source)
                .unwrap_or(SpecSourceType::All),
            api_source: ApiSourceType::from_str_name(decl.api_source)
                .unwrap_or(ApiSourceType::EaseGateway),
            token_type: AuthTokenType::from_str_name(decl.token_type)
                .unwrap_or(AuthTokenType::NoToken),
            timeout: decl.timeout.to_string(),
        }
    }
}

/// A gRPC service exposed through the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub spec: ServiceSpec,
    pub name: String,
    pub methods: Vec<Method>,
}

impl Service {
    pub fn new(spec: ServiceSpec, name: impl Into<String>) -> Self {
        Self {
            spec,
            name: name.into(),
            methods: Vec::new(),
        }
    }
}

/// Services sharing one deployment spec
pub struct ServiceGroup {
    pub spec: ServiceSpec,
    enable: Option<Callback>,
    disable: Option<Callback>,
    pub services: BTreeMap<String, Service>,
}

impl ServiceGroup {
    fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            enable: None,
            disable: None,
            services: BTreeMap::new(),
        }
    }

    /// Runs the enable callback; false when none is installed
    pub fn enable(&self) -> bool {
        self.enable.as_ref().map(|f| f()).is_some()
    }

    /// Runs the disable callback; false when none is installed
    pub fn disable(&self) -> bool {
        self.disable.as_ref().map(|f| f()).is_some()
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }
}

impl fmt::Debug for ServiceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceGroup")
            .field("spec", &self.spec)
            .field("enable", &self.enable.is_some())
            .field("disable", &self.disable.is_some())
            .field("services", &self.services)
            .finish()
    }
}

/// Registered service groups of one gateway process
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    groups: BTreeMap<SpecKey, ServiceGroup>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `service` in the group of its spec, creating the
    /// group on first use. Callbacks given here replace the group's.
    pub fn add_service(
        &mut self,
        service: Service,
        enable: Option<Callback>,
        disable: Option<Callback>,
    ) {
        let key = SpecKey::from(&service.spec);
        debug!(group = %key, service = %service.name, "adding service");

        let group = self
            .groups
            .entry(key)
            .or_insert_with(|| ServiceGroup::new(service.spec.clone()));
        if enable.is_some() {
            group.enable = enable;
        }
        if disable.is_some() {
            group.disable = disable;
        }
        group.services.insert(service.name.clone(), service);
    }

    /// Appends a method to `service` in the group of `spec`
    pub fn add_method(&mut self, spec: &ServiceSpec, service: &str, method: MethodDecl<'_>) -> Result<()> {
        let key = SpecKey::from(spec);
        let Some(group) = self.groups.get_mut(&key) else {
            return Err(RuntimeError::UnknownGroup(key));
        };
        let Some(svc) = group.services.get_mut(service) else {
            return Err(RuntimeError::UnknownService {
                group: key,
                service: service.to_string(),
            });
        };

        debug!(group = %key, %service, method = %method.name, path = %method.path, "adding method");
        svc.methods.push(Method::from(method));
        Ok(())
    }

    pub fn groups(&self) -> impl Iterator<Item = &ServiceGroup> {
        self.groups.values()
    }

    pub fn group(&self, spec: &ServiceSpec) -> Option<&ServiceGroup> {
        self.groups.get(&SpecKey::from(spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spec(service_id: &str) -> ServiceSpec {
        ServiceSpec {
            service_id: service_id.to_string(),
            port_name: "grpc".to_string(),
            namespace: "default".to_string(),
            ..Default::default()
        }
    }

    fn echo_decl() -> MethodDecl<'static> {
        MethodDecl {
            name: "Echo",
            path: "/v1/echo/{id}",
            http_method: "GET",
            login_required: true,
            spec_source: "WEB",
            api_source: "OPEN_GATEWAY",
            token_type: "EASE_TOKEN",
            timeout: "3s",
            ..Default::default()
        }
    }

    #[test]
    fn test_add_service_and_method() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(Service::new(spec("echo"), "EchoService"), None, None);
        registry
            .add_method(&spec("echo"), "EchoService", echo_decl())
            .unwrap();

        let group = registry.group(&spec("echo")).unwrap();
        let service = group.service("EchoService").unwrap();
        assert_eq!(service.methods.len(), 1);

        let method = &service.methods[0];
        assert_eq!(method.path, "/v1/echo/{id}");
        assert!(method.login_required);
        assert!(!method.enabled);
        assert_eq!(method.spec_source, SpecSourceType::Web);
        assert_eq!(method.api_source, ApiSourceType::OpenGateway);
        assert_eq!(method.token_type, AuthTokenType::EaseToken);
    }

    #[test]
    fn test_unknown_source_names_default() {
        let method = Method::from(MethodDecl {
            spec_source: "NOPE",
            api_source: "",
            token_type: "?",
            ..echo_decl()
        });
        assert_eq!(method.spec_source, SpecSourceType::All);
        assert_eq!(method.api_source, ApiSourceType::EaseGateway);
        assert_eq!(method.token_type, AuthTokenType::NoToken);
    }

    #[test]
    fn test_services_with_equal_specs_share_a_group() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(Service::new(spec("echo"), "EchoService"), None, None);
        registry.add_service(Service::new(spec("echo"), "AdminService"), None, None);
        registry.add_service(Service::new(spec("other"), "OtherService"), None, None);

        assert_eq!(registry.groups().count(), 2);
        let group = registry.group(&spec("echo")).unwrap();
        assert_eq!(
            group.services.keys().collect::<Vec<_>>(),
            vec!["AdminService", "EchoService"]
        );
    }

    #[test]
    fn test_add_service_upserts() {
        let mut registry = ServiceRegistry::new();
        registry.add_service(Service::new(spec("echo"), "EchoService"), None, None);
        registry
            .add_method(&spec("echo"), "EchoService", echo_decl())
            .unwrap();
        registry.add_service(Service::new(spec("echo"), "EchoService"), None, None);

        let group = registry.group(&spec("echo")).unwrap();
        assert_eq!(group.services.len(), 1);
        assert!(group.service("EchoService").unwrap().methods.is_empty());
    }

    #[test]
    fn test_callbacks_are_kept_unless_replaced() {
        let enabled = Arc::new(AtomicUsize::new(0));
        let counter = enabled.clone();
        let enable: Callback = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut registry = ServiceRegistry::new();
        registry.add_service(Service::new(spec("echo"), "EchoService"), Some(enable), None);
        registry.add_service(Service::new(spec("echo"), "AdminService"), None, None);

        let group = registry.group(&spec("echo")).unwrap();
        assert!(group.enable());
        assert!(!group.disable());
        assert_eq!(enabled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_add_method_to_unknown_target() {
        let mut registry = ServiceRegistry::new();
        let err = registry
            .add_method(&spec("echo"), "EchoService", echo_decl())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownGroup(_)));

        registry.add_service(Service::new(spec("echo"), "EchoService"), None, None);
        let err = registry
            .add_method(&spec("echo"), "Missing", echo_decl())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no service Missing registered in group default/echo:grpc (ROUND_ROBIN)"
        );
    }
}
