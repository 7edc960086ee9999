//! Go rendering of assignment expressions

use ease_gateway_descriptor::{Access, AccessStep, AssignableExpr, OneofGuard};

pub fn access(access: &Access) -> String {
    let mut out = access.root.clone();
    for step in &access.steps {
        match step {
            AccessStep::Field(name) | AccessStep::Oneof(name) => {
                out.push('.');
                out.push_str(name);
            }
            AccessStep::Getter(name) => {
                out.push_str(".Get");
                out.push_str(name);
                out.push_str("()");
            }
            AccessStep::Variant(wrapper) => {
                out.push_str(".(*");
                out.push_str(wrapper);
                out.push(')');
            }
        }
    }
    out
}

/// Statement that initializes the oneof group or rejects a mismatching
/// variant with `InvalidArgument`
pub fn guard(guard: &OneofGuard) -> String {
    let oneof = access(&guard.oneof);
    let wrapper = &guard.wrapper;
    format!(
        "if {oneof} == nil {{\n\
         \t{oneof} = &{wrapper}{{}}\n\
         }} else if _, ok := {oneof}.(*{wrapper}); !ok {{\n\
         \treturn nil, metadata, status.Errorf(codes.InvalidArgument, \"expect type: *{wrapper} in {service}.{method}, but: %t\\n\", {oneof})\n\
         }}",
        service = guard.service,
        method = guard.method,
    )
}

/// Guard statements in order, followed by the assignable expression
pub fn assignable(expr: &AssignableExpr) -> (Vec<String>, String) {
    (
        expr.guards.iter().map(guard).collect(),
        access(&expr.target),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oneof_access() -> Access {
        Access {
            root: "protoReq".to_string(),
            steps: vec![AccessStep::Oneof("Result".to_string())],
        }
    }

    #[test]
    fn test_render_access() {
        let target = Access {
            root: "protoReq".to_string(),
            steps: vec![
                AccessStep::Getter("Sub".to_string()),
                AccessStep::Oneof("Result".to_string()),
                AccessStep::Variant("Sub_Status".to_string()),
                AccessStep::Field("Note".to_string()),
            ],
        };
        assert_eq!(
            access(&target),
            "protoReq.GetSub().Result.(*Sub_Status).Note"
        );
        assert_eq!(access(&Access::new("protoReq")), "protoReq");
    }

    #[test]
    fn test_render_guard() {
        let rendered = guard(&OneofGuard {
            oneof: oneof_access(),
            wrapper: "UpdateRequest_Status".to_string(),
            service: "ExampleService".to_string(),
            method: "Update".to_string(),
        });

        assert_eq!(
            rendered,
            "if protoReq.Result == nil {\n\
             \tprotoReq.Result = &UpdateRequest_Status{}\n\
             } else if _, ok := protoReq.Result.(*UpdateRequest_Status); !ok {\n\
             \treturn nil, metadata, status.Errorf(codes.InvalidArgument, \"expect type: *UpdateRequest_Status in ExampleService.Update, but: %t\\n\", protoReq.Result)\n\
             }"
        );
    }
}
