//! Gateway file generation
//!
//! This crate drives a loaded [`Registry`] through emission: for each
//! target file it resolves the imports, assembles the [`GatewayParams`]
//! bundle and renders one `.pb.gw.go` file through an [`Emitter`].

mod config;
mod format;
mod imports;
mod params;
mod render;
mod templates;

pub use config::{GeneratorConfig, PathType};
pub use format::tidy;
pub use imports::{base_imports, resolve_imports};
pub use params::{
    BindingView, BodyView, DeploymentView, FileView, GatewayParams, ImportView, MethodView,
    ParamView, ServiceView,
};
pub use templates::load_templates;

use ease_gateway_common::{GeneratorError, Result};
use ease_gateway_descriptor::{FileId, GoPackage, Registry, Request, RuleAnalyzer};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tera::Tera;
use tracing::{debug, error, info};

/// One generated file, named relative to the output root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseFile {
    pub name: String,
    pub content: String,
}

impl ResponseFile {
    /// Writes the file below `dir`, creating parent directories
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let path = dir.join(&self.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GeneratorError::Generation(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        fs::write(&path, &self.content).map_err(|e| {
            GeneratorError::Generation(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}

/// Turns an emission bundle into Go source
#[cfg_attr(test, mockall::automock)]
pub trait Emitter {
    fn emit(&self, params: &GatewayParams) -> Result<String>;
}

/// Emitter backed by the bundled Tera template
pub struct TeraEmitter {
    tera: Tera,
}

impl TeraEmitter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tera: load_templates()?,
        })
    }
}

impl Emitter for TeraEmitter {
    fn emit(&self, params: &GatewayParams) -> Result<String> {
        let context = tera::Context::from_serialize(params)
            .map_err(|e| GeneratorError::Generation(format!("Template context error: {}", e)))?;
        self.tera
            .render(templates::GATEWAY_TEMPLATE, &context)
            .map_err(|e| GeneratorError::Generation(format!("Template error: {:?}", e)))
    }
}

/// Gateway generator
///
/// Holds the configuration, the reserved base imports and the validation
/// memo, which lives for the whole run.
pub struct GatewayGenerator<E: Emitter = TeraEmitter> {
    config: GeneratorConfig,
    base_imports: Vec<GoPackage>,
    analyzer: RuleAnalyzer,
    emitter: E,
}

impl GatewayGenerator<TeraEmitter> {
    /// Creates a generator using the bundled template. Reserves the base
    /// import aliases, so it must be created before `reg` is loaded.
    pub fn new(reg: &mut Registry, config: GeneratorConfig) -> Result<Self> {
        Self::with_emitter(reg, config, TeraEmitter::new()?)
    }
}

impl<E: Emitter> GatewayGenerator<E> {
    pub fn with_emitter(reg: &mut Registry, config: GeneratorConfig, emitter: E) -> Result<Self> {
        let base_imports = base_imports(reg)?;
        Ok(Self {
            config,
            base_imports,
            analyzer: RuleAnalyzer::new(),
            emitter,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Emission bundle of `file`
    pub fn params(&mut self, reg: &Registry, file: FileId) -> Result<GatewayParams> {
        let imports = resolve_imports(reg, &mut self.analyzer, &self.base_imports, file);
        params::build(reg, &mut self.analyzer, &self.config, file, &imports)
    }

    /// Generates one gateway file per target. Targets without bound
    /// services are skipped; any other error aborts the whole batch.
    pub fn generate(&mut self, reg: &Registry, targets: &[FileId]) -> Result<Vec<ResponseFile>> {
        let mut files = Vec::new();

        for &target in targets {
            let file = reg.file(target);
            let params = match self.params(reg, target) {
                Ok(params) => params,
                Err(e) if e.is_skip() => {
                    debug!(file = %file.name, "{}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let raw = self.emitter.emit(&params)?;
            let content = tidy(&file.name, &raw).inspect_err(|e| {
                error!(file = %file.name, error = %e, "{}", raw);
            })?;

            let name = self.config.output_name(&file.name, &file.go_pkg.path)?;
            info!(file = %file.name, output = %name, "generated gateway file");
            files.push(ResponseFile { name, content });
        }

        Ok(files)
    }
}

/// A plugin request loaded into a registry, ready to generate
pub struct PluginRun {
    pub registry: Registry,
    pub generator: GatewayGenerator,
    /// Files to generate, in request order
    pub targets: Vec<FileId>,
}

impl PluginRun {
    /// Configures from the request parameter and loads every file of the
    /// request. Fails on unknown target files.
    pub fn new(request: Request) -> Result<Self> {
        let config =
            GeneratorConfig::from_parameter(request.parameter.as_deref().unwrap_or_default())?;

        let mut registry = Registry::new();
        config.apply(&mut registry);
        let generator = GatewayGenerator::new(&mut registry, config)?;
        registry.load(request.files)?;

        let targets = request
            .file_to_generate
            .iter()
            .map(|name| registry.lookup_file(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            registry,
            generator,
            targets,
        })
    }

    pub fn generate(&mut self) -> Result<Vec<ResponseFile>> {
        self.generator.generate(&self.registry, &self.targets)
    }

    /// Emission bundles of the targets that have bound services
    pub fn inspect(&mut self) -> Result<Vec<GatewayParams>> {
        let mut bundles = Vec::new();
        for &target in &self.targets {
            match self.generator.params(&self.registry, target) {
                Ok(params) => bundles.push(params),
                Err(e) if e.is_skip() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(bundles)
    }
}

/// Runs a whole plugin request
pub fn generate_from_request(request: Request) -> Result<Vec<ResponseFile>> {
    PluginRun::new(request)?.generate()
}
