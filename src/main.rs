//! `bomcheck`: check a bill of materials for license conflicts and undeclared license files.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]) and set up logging.
//! 2. Load config ([`config::load_config`]).
//! 3. Load the manifest tree ([`manifest::load_file`]) and lint it ([`manifest::lint`]).
//! 4. Run the command: [`analyze`], [`scan`], [`verify`] or [`graph`].
//! 5. Render or write the result ([`report`]).
//! 6. Exit `0` (clean) or `1` (any warning or error).

mod analyze;
mod cli;
mod config;
mod error;
mod graph;
mod license;
mod manifest;
mod models;
mod origin;
mod path_util;
mod report;
mod scan;
mod verify;

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use cli::{AnalyzeArgs, Cli, Command, GraphArgs, ReportFormat, ScanArgs, VerifyArgs};
use config::{load_config, Config};
use error::BomError;
use license::identifier::TemplateCache;
use manifest::{ManifestNode, MANIFEST_FILE_NAME};
use scan::{Executor, ScanContext, ScanOptions};
use verify::VerifyOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let clean = match run(&cli).await {
        Ok(clean) => clean,
        Err(e) => {
            match e.downcast_ref::<BomError>() {
                Some(bom_error) => report::terminal::print_error(bom_error),
                None => eprintln!("{} {e:#}", "error:".red().bold()),
            }
            false
        }
    };

    if !clean {
        std::process::exit(1);
    }

    Ok(())
}

/// `warn` by default, one level more per `-v`. `RUST_LOG` wins when set.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Runs the selected command; `Ok(false)` means warnings were reported.
async fn run(cli: &Cli) -> Result<bool> {
    let (tree, manifest_path) = read_manifest(cli.file.as_deref())?;
    let project_dir = manifest::node::parent_dir(&manifest_path);
    let config = load_config(&project_dir, cli.config.as_deref())?;

    manifest::lint(&tree)?;

    match &cli.command {
        Command::Analyze(args) => run_analyze(cli, args, &tree, &manifest_path),
        Command::Scan(args) => run_scan(cli, args, &config, &tree).await,
        Command::Verify(args) => run_verify(cli, args, &config, &tree).await,
        Command::Graph(args) => run_graph(args, &tree),
    }
}

/// The manifest from `-f`, else piped stdin, else `./.bom.yaml`.
fn read_manifest(file: Option<&Path>) -> Result<(ManifestNode, PathBuf)> {
    if let Some(path) = file {
        return Ok((manifest::load_file(path)?, path.to_path_buf()));
    }

    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        let mut text = String::new();
        stdin
            .lock()
            .read_to_string(&mut text)
            .context("cannot read manifest from stdin")?;
        let tree = manifest::load_str(&text, "<stdin>", Path::new("."))?;
        return Ok((tree, PathBuf::from(MANIFEST_FILE_NAME)));
    }

    let default = PathBuf::from(MANIFEST_FILE_NAME);
    if default.is_file() {
        return Ok((manifest::load_file(&default)?, default));
    }
    bail!("no manifest given: pass -f FILE, pipe one on stdin, or add {MANIFEST_FILE_NAME}")
}

fn run_analyze(cli: &Cli, args: &AnalyzeArgs, tree: &ManifestNode, manifest_path: &Path) -> Result<bool> {
    let analysis = analyze::analyze_manifest(tree, args.distribution.source_distribution);

    match args.report {
        ReportFormat::Terminal => {
            report::terminal::render(&analysis, manifest_path, cli.verbose > 0, cli.quiet)?;
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
    }

    Ok(analysis.is_clean())
}

async fn run_scan(cli: &Cli, args: &ScanArgs, config: &Config, tree: &ManifestNode) -> Result<bool> {
    let executor = if args.sequential || !config.scan.parallel {
        Executor::Sequential
    } else {
        Executor::Pooled
    };
    let options = ScanOptions {
        is_source_dist: args.distribution.source_distribution,
        scan_components: args.recursive,
        add_declarations: args.add,
        coalesce: args.coalesce.map(Into::into).unwrap_or(config.scan.coalesce),
    };

    let mut ctx = ScanContext::new(TemplateCache::new(config.templates.dir()), executor);
    let pb = (!cli.quiet && executor == Executor::Pooled)
        .then(|| progress_bar(0, "directories"))
        .transpose()?;
    if let Some(pb) = &pb {
        ctx = ctx.with_progress(pb.clone());
    }

    let result = scan::scan_manifest(tree, &options, &ctx).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if let Some(updated) = result? {
        write_output(args.output.as_deref(), &serde_yaml::to_string(&updated.to_document())?)?;
    }
    Ok(true)
}

async fn run_verify(cli: &Cli, args: &VerifyArgs, config: &Config, tree: &ManifestNode) -> Result<bool> {
    let options = VerifyOptions {
        is_source_dist: args.distribution.source_distribution,
        check_origins: args.check_origins.is_some(),
    };
    let templates = TemplateCache::new(config.templates.dir());
    let verification = verify::verify_manifest(tree, &options, &templates)?;

    if options.check_origins {
        let origins = origin::collect_origins(tree, options.is_source_dist);
        let pb = (!cli.quiet)
            .then(|| progress_bar(origins.len() as u64, "origins"))
            .transpose()?;
        let checked = origin::verify_origins(&origins, pb.as_ref()).await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        checked?;
    }

    report::terminal::print_warnings(&verification.warnings);
    write_output(args.output.as_deref(), &serde_yaml::to_string(&verification.document)?)?;
    Ok(verification.warnings.is_empty())
}

fn run_graph(args: &GraphArgs, tree: &ManifestNode) -> Result<bool> {
    let graph = graph::tainted_walk(tree, args.distribution.source_distribution);
    tracing::info!(nodes = graph.nodes.len(), tainted = graph.is_tainted(), "built dependency graph");
    write_output(args.output.as_deref(), &graph::render_dot(&graph))?;
    Ok(true)
}

fn progress_bar(len: u64, unit: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
    );
    pb.set_message(unit.to_string());
    Ok(pb)
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("cannot write {}", path.display())),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}
