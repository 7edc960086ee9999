//! Option extension messages
//!
//! These mirror the `ease.api` option protos. They are decoded from the
//! raw `*Options` messages of the input descriptors (see the descriptor
//! crate's loader), so only the wire layout matters here.

/// Method option carrying the HTTP rule
pub const HTTP_EXTENSION: &str = "ease.api.http";

/// Standard `google.api.http` rule, consulted when [`HTTP_EXTENSION`] is absent
pub const GOOGLE_HTTP_EXTENSION: &str = "google.api.http";

/// Method option carrying auth/source metadata
pub const METHOD_EXTENSION: &str = "ease.api.method";

/// Field option carrying validation rules
pub const RULES_EXTENSION: &str = "ease.api.rules";

/// Service option carrying the routing spec and balancer
pub const SERVICE_SPEC_EXTENSION: &str = "ease.api.service_spec";

/// HTTP mapping of an RPC method (wire compatible with `google.api.HttpRule`)
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HttpRule {
    #[prost(string, tag = "1")]
    pub selector: String,
    #[prost(oneof = "http_rule::Pattern", tags = "2, 3, 4, 5, 6, 8")]
    pub pattern: Option<http_rule::Pattern>,
    #[prost(string, tag = "7")]
    pub body: String,
    #[prost(string, tag = "12")]
    pub response_body: String,
    #[prost(message, repeated, tag = "11")]
    pub additional_bindings: Vec<HttpRule>,
}

pub mod http_rule {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Pattern {
        #[prost(string, tag = "2")]
        Get(String),
        #[prost(string, tag = "3")]
        Put(String),
        #[prost(string, tag = "4")]
        Post(String),
        #[prost(string, tag = "5")]
        Delete(String),
        #[prost(string, tag = "6")]
        Patch(String),
        #[prost(message, tag = "8")]
        Custom(super::CustomHttpPattern),
    }
}

impl HttpRule {
    /// HTTP verb and path template of this rule, if a pattern is set
    pub fn verb_and_path(&self) -> Option<(&str, &str)> {
        use http_rule::Pattern;

        match self.pattern.as_ref()? {
            Pattern::Get(path) => Some(("GET", path)),
            Pattern::Put(path) => Some(("PUT", path)),
            Pattern::Post(path) => Some(("POST", path)),
            Pattern::Delete(path) => Some(("DELETE", path)),
            Pattern::Patch(path) => Some(("PATCH", path)),
            Pattern::Custom(custom) => Some((custom.kind.as_str(), custom.path.as_str())),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CustomHttpPattern {
    #[prost(string, tag = "1")]
    pub kind: String,
    #[prost(string, tag = "2")]
    pub path: String,
}

/// Auth and source metadata of an RPC method
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApiMethod {
    #[prost(bool, tag = "1")]
    pub login_required: bool,
    #[prost(bool, tag = "2")]
    pub client_sign_required: bool,
    #[prost(bool, tag = "3")]
    pub is_third_party: bool,
    #[prost(enumeration = "ApiSourceType", tag = "4")]
    pub api_source: i32,
    #[prost(enumeration = "AuthTokenType", tag = "5")]
    pub token_type: i32,
    #[prost(enumeration = "SpecSourceType", tag = "6")]
    pub spec_source_type: i32,
    #[prost(string, tag = "7")]
    pub hash_key: String,
    #[prost(string, tag = "8")]
    pub timeout: String,
}

/// One validation constraint on a field
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidationRule {
    #[prost(enumeration = "OperatorType", tag = "1")]
    pub operator: i32,
    #[prost(enumeration = "ValueType", tag = "2")]
    pub r#type: i32,
    #[prost(string, tag = "3")]
    pub value: String,
    #[prost(enumeration = "FunctionType", tag = "4")]
    pub function: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FieldRules {
    #[prost(message, repeated, tag = "1")]
    pub rules: Vec<ValidationRule>,
}

/// Deployment metadata of a service: routing identity and balancer
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceSpec {
    #[prost(string, tag = "1")]
    pub service_id: String,
    #[prost(string, tag = "2")]
    pub port_name: String,
    #[prost(string, tag = "3")]
    pub namespace: String,
    #[prost(bool, tag = "4")]
    pub gen_controller: bool,
    #[prost(enumeration = "LoadBalancer", tag = "5")]
    pub balancer: i32,
}

/// Implements the protobuf-style upper snake case names for an enumeration.
macro_rules! str_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Name of the value as written in the `.proto` file
            pub fn as_str_name(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }

            /// Parses a value from its `.proto` name
            pub fn from_str_name(value: &str) -> Option<Self> {
                match value {
                    $($name => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum OperatorType {
    Unspecified = 0,
    Eq = 1,
    Gt = 2,
    Lt = 3,
    Match = 4,
    NonNil = 5,
    LenEq = 6,
    LenGt = 7,
    LenLt = 8,
}

str_names!(OperatorType {
    Unspecified => "OPERATOR_TYPE_UNSPECIFIED",
    Eq => "EQ",
    Gt => "GT",
    Lt => "LT",
    Match => "MATCH",
    NonNil => "NON_NIL",
    LenEq => "LEN_EQ",
    LenGt => "LEN_GT",
    LenLt => "LEN_LT",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ValueType {
    Unspecified = 0,
    String = 1,
    Number = 2,
    Obj = 3,
}

str_names!(ValueType {
    Unspecified => "VALUE_TYPE_UNSPECIFIED",
    String => "STRING",
    Number => "NUMBER",
    Obj => "OBJ",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FunctionType {
    Unspecified = 0,
    Trim = 1,
}

str_names!(FunctionType {
    Unspecified => "FUNCTION_TYPE_UNSPECIFIED",
    Trim => "TRIM",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ApiSourceType {
    EaseGateway = 0,
    OpenGateway = 1,
}

str_names!(ApiSourceType {
    EaseGateway => "EASE_GATEWAY",
    OpenGateway => "OPEN_GATEWAY",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AuthTokenType {
    NoToken = 0,
    EaseToken = 1,
    OpenToken = 2,
}

str_names!(AuthTokenType {
    NoToken => "NO_TOKEN",
    EaseToken => "EASE_TOKEN",
    OpenToken => "OPEN_TOKEN",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SpecSourceType {
    All = 0,
    Web = 1,
    App = 2,
    Mini = 3,
}

str_names!(SpecSourceType {
    All => "ALL",
    Web => "WEB",
    App => "APP",
    Mini => "MINI",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LoadBalancer {
    RoundRobin = 0,
    Consistent = 1,
}

str_names!(LoadBalancer {
    RoundRobin => "ROUND_ROBIN",
    Consistent => "CONSISTENT",
});

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_verb_and_path() {
        let rule = HttpRule {
            pattern: Some(http_rule::Pattern::Get("/v1/example/echo/{id}".to_string())),
            ..Default::default()
        };
        assert_eq!(rule.verb_and_path(), Some(("GET", "/v1/example/echo/{id}")));

        let custom = HttpRule {
            pattern: Some(http_rule::Pattern::Custom(CustomHttpPattern {
                kind: "HEAD".to_string(),
                path: "/v1/ping".to_string(),
            })),
            ..Default::default()
        };
        assert_eq!(custom.verb_and_path(), Some(("HEAD", "/v1/ping")));

        assert_eq!(HttpRule::default().verb_and_path(), None);
    }

    #[test]
    fn test_validation_rule_decodes_from_wire() {
        let rule = ValidationRule {
            operator: OperatorType::LenGt as i32,
            r#type: ValueType::String as i32,
            value: "3".to_string(),
            function: FunctionType::Trim as i32,
        };
        let decoded = ValidationRule::decode(rule.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.operator(), OperatorType::LenGt);
        assert_eq!(decoded.function(), FunctionType::Trim);
    }

    #[test]
    fn test_str_names() {
        assert_eq!(OperatorType::NonNil.as_str_name(), "NON_NIL");
        assert_eq!(
            SpecSourceType::from_str_name("WEB"),
            Some(SpecSourceType::Web)
        );
        assert_eq!(ApiSourceType::from_str_name("nope"), None);
    }
}
