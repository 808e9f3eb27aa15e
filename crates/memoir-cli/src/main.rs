//! `memoir` command-line tool
//!
//! - `materialize`: attach local images to a draft and store them
//! - `orphans`: list (or delete) images an edit no longer references
//! - `check`: fail if a body still holds temporary image references

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use memoir_document::{DocumentBody, DocumentFormat};
use memoir_media::{
    find_orphaned_images, FilesystemObjectStore, ImageFile, LoggingConfig, Materializer,
    MemoirConfig, OrphanSweeper, PendingImageRegistry,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("memoir")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Deferred image upload tools for memoir episodes")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("materialize")
                .about("Insert local images into a draft, upload them and print the durable body")
                .arg(draft_arg())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_parser(["json", "html", "markdown"])
                        .help("Body format (default: from the draft's extension)"),
                )
                .arg(
                    Arg::new("attach")
                        .long("attach")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(PathBuf))
                        .help("Image to insert at the end of the draft (repeatable)"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the result here instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("orphans")
                .about("List stored images present in one version of a body but not the next")
                .arg(
                    Arg::new("before")
                        .long("before")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("after")
                        .long("after")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("delete")
                        .long("delete")
                        .action(ArgAction::SetTrue)
                        .help("Delete orphans owned by the configured store"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Exit non-zero if the body still references temporary images")
                .arg(draft_arg()),
        )
}

fn draft_arg() -> Arg {
    Arg::new("draft")
        .long("draft")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Episode body file (.json, .html, .md)")
}

fn init_tracing(logging: &LoggingConfig, force_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json || force_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<MemoirConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => MemoirConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(MemoirConfig::default()),
    }
}

async fn read_body(path: &Path, format: Option<&str>) -> Result<DocumentBody> {
    let format = match format {
        Some("json") => DocumentFormat::Json,
        Some("html") => DocumentFormat::Html,
        Some("markdown") => DocumentFormat::Markdown,
        Some(other) => bail!("unknown format: {other}"),
        None => DocumentFormat::from_path(path)?,
    };
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(DocumentBody::new(format, source))
}

async fn materialize(config: MemoirConfig, args: &ArgMatches) -> Result<()> {
    let draft = args
        .get_one::<PathBuf>("draft")
        .context("--draft is required")?;
    let mut body = read_body(draft, args.get_one::<String>("format").map(String::as_str)).await?;

    let mut registry = PendingImageRegistry::new(
        config.media.limits.clone(),
        config.media.temporary_origin.clone(),
    );
    for path in args.get_many::<PathBuf>("attach").into_iter().flatten() {
        let file = ImageFile::from_path(path).await?;
        let alt = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reference = registry
            .add_pending_image(file)
            .with_context(|| format!("attaching {}", path.display()))?;
        body = body.append_image(reference.as_str(), &alt)?;
    }

    let store = Arc::new(FilesystemObjectStore::from_config(&config.storage));
    let materializer = Materializer::new(store, config.media);
    let (durable, stats) = materializer
        .materialize_with_stats(&mut registry, &body)
        .await?;
    tracing::info!(uploaded = stats.uploaded, rewritten = stats.rewritten, "draft materialized");

    match args.get_one::<PathBuf>("out") {
        Some(out) => tokio::fs::write(out, durable.source())
            .await
            .with_context(|| format!("writing {}", out.display()))?,
        None => println!("{}", durable.source()),
    }
    Ok(())
}

async fn orphans(config: MemoirConfig, args: &ArgMatches) -> Result<()> {
    let before = args.get_one::<PathBuf>("before").context("--before is required")?;
    let after = args.get_one::<PathBuf>("after").context("--after is required")?;
    let previous = read_body(before, None).await?;
    let next = read_body(after, None).await?;

    let orphans = find_orphaned_images(&previous, &next)?;
    for url in &orphans {
        println!("{url}");
    }

    if args.get_flag("delete") {
        let sweeper = OrphanSweeper::new(Arc::new(FilesystemObjectStore::from_config(&config.storage)));
        let report = sweeper.sweep(orphans).await;
        eprintln!(
            "deleted: {}, foreign: {}, failed: {}",
            report.deleted.len(),
            report.foreign.len(),
            report.failed.len()
        );
        if !report.failed.is_empty() {
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn check(args: &ArgMatches) -> Result<()> {
    let draft = args
        .get_one::<PathBuf>("draft")
        .context("--draft is required")?;
    let body = read_body(draft, None).await?;
    let refs = body.temporary_references()?;
    if refs.is_empty() {
        println!("ok: no temporary image references");
        return Ok(());
    }
    for reference in &refs {
        println!("{reference}");
    }
    eprintln!("{} temporary image reference(s) found", refs.len());
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    init_tracing(&config.logging, matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("materialize", args)) => materialize(config, args).await,
        Some(("orphans", args)) => orphans(config, args).await,
        Some(("check", args)) => check(args).await,
        _ => unreachable!("subcommand_required"),
    }
}
