//! Go imports of a generated gateway file

use ease_gateway_common::Result;
use ease_gateway_descriptor::{FileId, GoPackage, Registry, RuleAnalyzer};
use prost_types::field_descriptor_proto::Type;
use std::collections::HashSet;

/// Packages every gateway file imports, with their fixed aliases. Each one
/// is referenced by the template, unconditionally or through a `var _`
/// sentinel.
const BASE_IMPORTS: &[(&str, Option<&str>)] = &[
    ("context", None),
    ("io", None),
    ("net/http", None),
    ("github.com/binchencoder/ease-gateway/gateway/runtime", None),
    ("github.com/grpc-ecosystem/grpc-gateway/utilities", None),
    ("github.com/golang/protobuf/proto", None),
    ("github.com/binchencoder/skylb-api/proto", Some("skypb")),
    ("google.golang.org/grpc", None),
    ("google.golang.org/grpc/codes", None),
    ("google.golang.org/grpc/status", None),
];

/// Framework packages whose names stay reserved although generated files
/// do not import them, so file packages never take these aliases.
const RESERVED_PACKAGES: &[(&str, Option<&str>)] = &[
    ("regexp", None),
    ("strings", None),
    ("sync", None),
    ("unicode/utf8", None),
    ("github.com/binchencoder/gateway-proto/data", Some("vexpb")),
    ("github.com/binchencoder/gateway-proto/frontend", Some("fpb")),
    ("github.com/binchencoder/letsgo/grpc", Some("lgr")),
    ("github.com/binchencoder/skylb-api/balancer", None),
    ("github.com/binchencoder/skylb-api/client", None),
    ("github.com/binchencoder/skylb-api/client/option", None),
    ("google.golang.org/grpc/naming", None),
    ("google.golang.org/grpc/grpclog", None),
];

fn reserve(reg: &mut Registry, path: &str, alias: Option<&str>) -> Result<GoPackage> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let mut pkg = GoPackage::new(path, name);
    match alias {
        Some(alias) => {
            reg.reserve_go_package_alias(alias, path)?;
            pkg.alias = Some(alias.to_string());
        }
        None => pkg.alias = reg.reserve_unique_alias(name, path),
    }
    Ok(pkg)
}

/// Reserves the base imports and the framework package names in the
/// registry and returns the base imports. Must run before the registry is
/// loaded so these aliases win over file packages.
pub fn base_imports(reg: &mut Registry) -> Result<Vec<GoPackage>> {
    for (path, alias) in RESERVED_PACKAGES {
        reserve(reg, path, *alias)?;
    }
    BASE_IMPORTS
        .iter()
        .map(|(path, alias)| reserve(reg, path, *alias))
        .collect()
}

/// Collects the imports of `file`: the base set followed by the packages
/// its bound methods reference. Each import path appears once; the first
/// entry for a path wins.
pub fn resolve_imports(
    reg: &Registry,
    analyzer: &mut RuleAnalyzer,
    base: &[GoPackage],
    file: FileId,
) -> Vec<GoPackage> {
    let current = &reg.file(file).go_pkg;
    let mut seen = base.iter().map(|p| p.path.clone()).collect::<HashSet<_>>();
    let mut imports = base.to_vec();

    let mut add = |pkg: &GoPackage, imports: &mut Vec<GoPackage>| {
        if pkg.path != current.path && seen.insert(pkg.path.clone()) {
            imports.push(pkg.clone());
        }
    };

    for service in &reg.file(file).services {
        for method in service.methods.iter().filter(|m| !m.bindings.is_empty()) {
            // Enum path parameters declared elsewhere.
            for binding in &method.bindings {
                for param in &binding.path_params {
                    let field = reg.field(param.target);
                    if field.r#type != Type::Enum {
                        continue;
                    }
                    let Ok(enum_id) = reg.lookup_enum("", &field.type_name) else {
                        continue;
                    };
                    let pkg = &reg.file(reg.enum_type(enum_id).file).go_pkg;
                    add(pkg, &mut imports);
                }
            }

            // Validation functions of referenced messages.
            if analyzer.has_rule(reg, method.request) {
                for field in &reg.message(method.request).fields {
                    let Some(referenced) = field.field_message else {
                        continue;
                    };
                    if analyzer.has_rule(reg, referenced) {
                        add(reg.message_go_package(referenced), &mut imports);
                    }
                }
            }

            add(reg.message_go_package(method.request), &mut imports);
        }
    }

    imports
}
