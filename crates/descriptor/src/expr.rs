//! Assignment expressions for field paths
//!
//! A field path is turned into a small tree of access steps plus the oneof
//! guards that must run before the path can be dereferenced. The generator
//! renders this into Go; nothing here knows Go syntax beyond naming.

use crate::casing::camel;
use crate::registry::Registry;
use crate::types::{Body, FieldPath, MethodRef, Syntax};
use serde::Serialize;

/// One step from a value to one of its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum AccessStep {
    /// Direct struct field: `.Name`
    Field(String),
    /// Accessor call: `.GetName()`
    Getter(String),
    /// The interface-typed field holding a oneof group: `.Result`
    Oneof(String),
    /// Type assertion to a oneof wrapper: `.(*Msg_Status)`
    Variant(String),
}

/// A chain of access steps from a root expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Access {
    pub root: String,
    pub steps: Vec<AccessStep>,
}

impl Access {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            steps: Vec::new(),
        }
    }

    fn with(&self, step: AccessStep) -> Self {
        let mut next = self.clone();
        next.steps.push(step);
        next
    }
}

/// Initializes an unset oneof group with `wrapper`, and rejects the
/// request when the group already holds a different variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OneofGuard {
    /// The oneof group field
    pub oneof: Access,
    /// Go type of the expected wrapper, without the pointer
    pub wrapper: String,
    pub service: String,
    pub method: String,
}

/// Assignable target plus the guards that must run first, outermost first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignableExpr {
    pub guards: Vec<OneofGuard>,
    pub target: Access,
}

impl FieldPath {
    /// Builds the expression assigning to the end of this path, starting
    /// from the request value `root`.
    pub fn assignable_expr(
        &self,
        reg: &Registry,
        root: &str,
        current_package: &str,
        method: MethodRef,
    ) -> AssignableExpr {
        let method = reg.method(method);
        let mut guards = Vec::new();
        let mut access = Access::new(root);
        let last = self.len().saturating_sub(1);

        for (i, component) in self.components().iter().enumerate() {
            let field = reg.field(component.target);
            let owner = reg.message(component.target.message);
            let name = camel(&component.name);

            if let Some(oneof) = owner.oneof_decl_go_name(field) {
                let go_pkg = reg.message_go_package(component.target.message);
                let wrapper = format!("{}_{}", owner.go_type(go_pkg, current_package), name);

                access = access.with(AccessStep::Oneof(oneof));
                guards.push(OneofGuard {
                    oneof: access.clone(),
                    wrapper: wrapper.clone(),
                    service: method.service_name.clone(),
                    method: method.name.clone(),
                });
                access = access.with(AccessStep::Variant(wrapper));
            }

            let step = if i == last || owner.syntax != Syntax::Proto2 {
                AccessStep::Field(name)
            } else {
                AccessStep::Getter(name)
            };
            access = access.with(step);
        }

        AssignableExpr {
            guards,
            target: access,
        }
    }

    /// Whether the path goes through a nested message of a proto3 file
    pub fn is_nested_proto3(&self, reg: &Registry) -> bool {
        match self.components().first() {
            Some(first) if self.len() > 1 => {
                reg.message(first.target.message).syntax != Syntax::Proto2
            }
            _ => false,
        }
    }
}

impl Body {
    pub fn assignable_expr(
        &self,
        reg: &Registry,
        root: &str,
        current_package: &str,
        method: MethodRef,
    ) -> AssignableExpr {
        self.field_path
            .assignable_expr(reg, root, current_package, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_steps_accumulate() {
        let root = Access::new("protoReq");
        let nested = root
            .with(AccessStep::Oneof("Result".to_string()))
            .with(AccessStep::Variant("Msg_Status".to_string()));

        assert!(root.steps.is_empty());
        assert_eq!(nested.steps.len(), 2);
        assert_eq!(nested.root, "protoReq");
    }

    #[test]
    fn test_access_step_serialization() {
        let json = serde_json::to_value(AccessStep::Getter("Sub".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "getter", "name": "Sub" }));
    }
}
