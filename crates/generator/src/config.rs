//! Generator configuration
//!
//! The configuration arrives as the protoc plugin parameter, a comma
//! separated list of `key=value` pairs such as
//! `paths=source_relative,allow_delete_body=true,Mfoo.proto=example.com/foo`.

use ease_gateway_common::{GeneratorError, Result};
use ease_gateway_descriptor::Registry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// How output file names are derived
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    /// Output goes to the Go import path of the file (default)
    #[default]
    Import,
    /// Output goes next to the input `.proto` file
    SourceRelative,
}

impl PathType {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "" | "import" => Ok(PathType::Import),
            "source_relative" => Ok(PathType::SourceRelative),
            other => Err(GeneratorError::Config(format!(
                "Unknown path type {:?}: want \"import\" or \"source_relative\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorConfig {
    pub path_type: PathType,
    /// Go module prefix stripped from output paths
    pub module: Option<String>,
    /// Prefix prepended to Go import paths derived from file locations
    pub import_prefix: String,
    /// Suffix of the generated `Register*` functions
    pub register_func_suffix: String,
    /// Use the HTTP request context instead of the background context
    pub use_request_context: bool,
    /// Populate field masks from PATCH bodies
    pub allow_patch_feature: bool,
    pub allow_delete_body: bool,
    pub generate_unbound_methods: bool,
    /// Proto file → Go import path overrides
    pub pkg_map: BTreeMap<String, String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            path_type: PathType::Import,
            module: None,
            import_prefix: String::new(),
            register_func_suffix: "Handler".to_string(),
            use_request_context: true,
            allow_patch_feature: true,
            allow_delete_body: false,
            generate_unbound_methods: false,
            pkg_map: BTreeMap::new(),
        }
    }
}

impl GeneratorConfig {
    /// Parses the protoc plugin parameter. A key without a value sets a
    /// boolean option to true.
    pub fn from_parameter(parameter: &str) -> Result<Self> {
        let mut config = Self::default();

        for item in parameter.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = match item.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (item, None),
            };

            if let Some(file) = key.strip_prefix('M') {
                let path = value.ok_or_else(|| {
                    GeneratorError::Config(format!("missing Go package for {}", file))
                })?;
                config.pkg_map.insert(file.to_string(), path.to_string());
                continue;
            }

            match key {
                "paths" => config.path_type = PathType::parse(value.unwrap_or_default())?,
                "module" => config.module = value.filter(|v| !v.is_empty()).map(String::from),
                "import_prefix" => config.import_prefix = value.unwrap_or_default().to_string(),
                "register_func_suffix" => {
                    config.register_func_suffix = value.unwrap_or_default().to_string()
                }
                "request_context" => config.use_request_context = parse_bool(key, value)?,
                "allow_patch_feature" => config.allow_patch_feature = parse_bool(key, value)?,
                "allow_delete_body" => config.allow_delete_body = parse_bool(key, value)?,
                "generate_unbound_methods" => {
                    config.generate_unbound_methods = parse_bool(key, value)?
                }
                other => {
                    return Err(GeneratorError::Config(format!(
                        "unknown parameter {:?}",
                        other
                    )))
                }
            }
        }

        if config.module.is_some() && config.path_type != PathType::Import {
            return Err(GeneratorError::Config(
                "cannot use module= with paths=".to_string(),
            ));
        }

        Ok(config)
    }

    /// Transfers the options that affect descriptor loading. Must be
    /// called before [`Registry::load`].
    pub fn apply(&self, reg: &mut Registry) {
        reg.set_prefix(self.import_prefix.clone());
        for (file, path) in &self.pkg_map {
            reg.add_pkg_map(file.clone(), path.clone());
        }
        reg.set_allow_delete_body(self.allow_delete_body);
        reg.set_generate_unbound_methods(self.generate_unbound_methods);
    }

    /// Name of the gateway file generated for the proto file `name` whose
    /// Go package lives at `go_path`
    pub fn output_name(&self, name: &str, go_path: &str) -> Result<String> {
        let base = Path::new(name)
            .file_name()
            .and_then(|b| b.to_str())
            .unwrap_or(name);

        let path = match (&self.module, self.path_type) {
            (Some(_), PathType::SourceRelative) => {
                return Err(GeneratorError::Config(
                    "cannot use module= with paths=".to_string(),
                ))
            }
            (Some(module), PathType::Import) => {
                let trim = format!("{}/", module);
                let pkg = format!("{}/", go_path);
                let rest = pkg.strip_prefix(&trim).ok_or_else(|| {
                    GeneratorError::Config(format!(
                        "{}: file go path does not match module prefix: {}",
                        go_path, trim
                    ))
                })?;
                format!("{}{}", rest, base)
            }
            (None, PathType::Import) if !go_path.is_empty() && go_path != "." => format!("{}/{}", go_path, base),
            (None, _) => name.to_string(),
        };

        let stem = match path.rsplit_once('.') {
            Some((stem, ext)) if !ext.contains('/') => stem,
            _ => path.as_str(),
        };
        Ok(format!("{}.pb.gw.go", stem))
    }
}

fn parse_bool(key: &str, value: Option<&str>) -> Result<bool> {
    match value {
        None | Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(GeneratorError::Config(format!(
            "invalid value {:?} for {}: want true or false",
            other, key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::from_parameter("").unwrap();
        assert_eq!(config, GeneratorConfig::default());
        assert!(config.use_request_context);
        assert_eq!(config.register_func_suffix, "Handler");
    }

    #[test]
    fn test_parse_parameter() {
        let config = GeneratorConfig::from_parameter(
            "paths=source_relative,allow_delete_body,request_context=false,Mfoo/bar.proto=example.com/bar",
        )
        .unwrap();
        assert_eq!(config.path_type, PathType::SourceRelative);
        assert!(config.allow_delete_body);
        assert!(!config.use_request_context);
        assert_eq!(
            config.pkg_map.get("foo/bar.proto").map(String::as_str),
            Some("example.com/bar")
        );
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(GeneratorConfig::from_parameter("paths=nowhere").is_err());
        assert!(GeneratorConfig::from_parameter("allow_delete_body=yes").is_err());
        assert!(GeneratorConfig::from_parameter("bogus=1").is_err());
        assert!(GeneratorConfig::from_parameter("module=example.com,paths=source_relative").is_err());
    }

    #[test]
    fn test_output_name() {
        let config = GeneratorConfig::default();
        assert_eq!(
            config.output_name("proto/echo.proto", "example.com/gen/echo").unwrap(),
            "example.com/gen/echo/echo.pb.gw.go"
        );

        let relative = GeneratorConfig {
            path_type: PathType::SourceRelative,
            ..Default::default()
        };
        assert_eq!(
            relative.output_name("proto/echo.proto", "example.com/gen/echo").unwrap(),
            "proto/echo.pb.gw.go"
        );

        let module = GeneratorConfig {
            module: Some("example.com/gen".to_string()),
            ..Default::default()
        };
        assert_eq!(
            module.output_name("proto/echo.proto", "example.com/gen/echo").unwrap(),
            "echo/echo.pb.gw.go"
        );
        assert!(module.output_name("proto/echo.proto", "other.com/echo").is_err());
    }
}
