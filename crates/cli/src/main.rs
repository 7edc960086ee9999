//! ease-gateway protoc plugin
//!
//! Invoked by protoc without arguments, it reads a `CodeGeneratorRequest`
//! from stdin and writes the `CodeGeneratorResponse` to stdout. The
//! `generate` and `inspect` subcommands run the same pipeline on a
//! `FileDescriptorSet` written by `protoc --include_imports --descriptor_set_out`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use ease_gateway_descriptor::{decode_descriptor_set, decode_request, Request, SourceFile};
use ease_gateway_generator::{generate_from_request, PluginRun, ResponseFile};
use prost::Message;
use prost_types::compiler::code_generator_response::{self, Feature};
use prost_types::compiler::CodeGeneratorResponse;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "protoc-gen-ease-gateway")]
#[command(version, about = "Generate HTTP gateway handlers for annotated gRPC services", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate gateway files from a descriptor set into a directory
    #[command(after_help = "EXAMPLES:\n  \
        protoc --include_imports --descriptor_set_out=echo.pb echo.proto\n  \
        protoc-gen-ease-gateway generate --descriptor-set echo.pb --output ./gen")]
    Generate {
        /// Path to the FileDescriptorSet
        #[arg(short, long)]
        descriptor_set: PathBuf,

        /// Files to generate (all files of the set if omitted)
        #[arg(short, long = "file")]
        files: Vec<String>,

        /// Plugin parameter, e.g. `paths=source_relative,allow_delete_body`
        #[arg(short, long)]
        parameter: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Dump the resolved bindings of a descriptor set as JSON
    Inspect {
        /// Path to the FileDescriptorSet
        #[arg(short, long)]
        descriptor_set: PathBuf,

        /// Files to inspect (all files of the set if omitted)
        #[arg(short, long = "file")]
        files: Vec<String>,

        /// Plugin parameter
        #[arg(short, long)]
        parameter: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        None => plugin_command()?,
        Some(Commands::Generate {
            descriptor_set,
            files,
            parameter,
            output,
        }) => {
            generate_command(&descriptor_set, files, parameter, &output, cli.verbose)?;
        }
        Some(Commands::Inspect {
            descriptor_set,
            files,
            parameter,
        }) => {
            inspect_command(&descriptor_set, files, parameter)?;
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries the plugin response.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn plugin_command() -> Result<()> {
    let mut input = Vec::new();
    io::stdin()
        .read_to_end(&mut input)
        .context("Failed to read CodeGeneratorRequest from stdin")?;

    let response = plugin_response(&input);
    if let Some(error) = &response.error {
        tracing::error!(%error, "generation failed");
    }

    io::stdout()
        .write_all(&response.encode_to_vec())
        .context("Failed to write CodeGeneratorResponse")?;
    Ok(())
}

/// Errors are reported through the response so protoc can show them.
fn plugin_response(input: &[u8]) -> CodeGeneratorResponse {
    let result = decode_request(input).and_then(generate_from_request);

    match result {
        Ok(files) => CodeGeneratorResponse {
            supported_features: Some(Feature::Proto3Optional as u64),
            file: files
                .into_iter()
                .map(|f| code_generator_response::File {
                    name: Some(f.name),
                    content: Some(f.content),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        },
        Err(e) => CodeGeneratorResponse {
            error: Some(e.to_string()),
            ..Default::default()
        },
    }
}

fn load_request(path: &Path, files: Vec<String>, parameter: Option<String>) -> Result<Request> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read descriptor set {}", path.display()))?;
    let sources = decode_descriptor_set(&bytes).context("Failed to decode descriptor set")?;
    Ok(standalone_request(sources, files, parameter))
}

fn standalone_request(
    sources: Vec<SourceFile>,
    files: Vec<String>,
    parameter: Option<String>,
) -> Request {
    let file_to_generate = if files.is_empty() {
        sources.iter().map(|s| s.proto.name().to_string()).collect()
    } else {
        files
    };

    Request {
        file_to_generate,
        parameter,
        files: sources,
    }
}

fn generate_command(
    descriptor_set: &Path,
    files: Vec<String>,
    parameter: Option<String>,
    output: &Path,
    verbose: bool,
) -> Result<()> {
    println!(
        "{} Loading descriptor set: {}",
        "→".cyan(),
        descriptor_set.display()
    );
    let request = load_request(descriptor_set, files, parameter)?;

    if verbose {
        println!("  Files: {}", request.file_to_generate.len());
        println!("  Output: {}", output.display());
    }

    println!("{} Generating gateway files...", "→".cyan());
    let generated = generate_from_request(request).context("Failed to generate gateway files")?;
    write_files(&generated, output)?;

    println!("\n{}", "✓ Generation complete!".green().bold());
    if generated.is_empty() {
        println!("  {}", "No file declares an HTTP binding".yellow());
    }
    for file in &generated {
        println!("  {}", output.join(&file.name).display());
    }

    Ok(())
}

fn write_files(files: &[ResponseFile], output: &Path) -> Result<()> {
    for file in files {
        file.write_to(output)
            .with_context(|| format!("Failed to write {}", file.name))?;
    }
    Ok(())
}

fn inspect_command(
    descriptor_set: &Path,
    files: Vec<String>,
    parameter: Option<String>,
) -> Result<()> {
    let request = load_request(descriptor_set, files, parameter)?;
    let mut run = PluginRun::new(request).context("Failed to load descriptors")?;
    let bundles = run.inspect().context("Failed to resolve bindings")?;

    println!("{}", serde_json::to_string_pretty(&bundles)?);
    Ok(())
}
