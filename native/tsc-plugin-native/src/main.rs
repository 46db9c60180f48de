use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use tsc_plugin_native::{
    collect_sources, load_all, FileFilter, PluginOptions, SelectionPolicy, TscPlugin,
};

#[derive(Parser, Debug)]
#[command(
    name = "tsc-plugin",
    version,
    about = "Re-emit decorator-bearing TypeScript files with decorator metadata"
)]
struct Cli {
    /// Files or directories to process
    #[arg(required_unless_present = "show_config")]
    paths: Vec<PathBuf>,

    /// Configuration file, searched upward from --cwd (default: tsconfig.json)
    #[arg(long)]
    tsconfig: Option<PathBuf>,

    /// Regex replacing the default `\.tsx?$` file pattern
    #[arg(long)]
    filter: Option<String>,

    #[arg(long, value_enum, default_value_t = PolicyArg::Decorators)]
    policy: PolicyArg,

    /// Write replaced outputs here as `.js`, mirroring paths relative to --cwd
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Working directory for configuration lookup
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    show_config: bool,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    /// Metadata flag set and a decorator found in the text
    Decorators,
    /// Metadata flag set
    Metadata,
    /// Every matching file
    Always,
}

impl From<PolicyArg> for SelectionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Decorators => SelectionPolicy::DecoratorScan,
            PolicyArg::Metadata => SelectionPolicy::MetadataFlag,
            PolicyArg::Always => SelectionPolicy::always(),
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn output_path(out_dir: &Path, cwd: &Path, source: &Path) -> PathBuf {
    let relative = match source.strip_prefix(cwd) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| source.to_path_buf()),
    };
    out_dir.join(relative).with_extension("js")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let cwd = match cli.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir().context("failed to determine working directory")?,
    };

    let mut options = PluginOptions::default().policy(cli.policy.into());
    if let Some(tsconfig) = cli.tsconfig {
        options = options.tsconfig_path(tsconfig);
    }
    if let Some(pattern) = cli.filter.as_deref() {
        let regex = Regex::new(pattern).with_context(|| format!("invalid filter '{}'", pattern))?;
        options = options.filter(FileFilter::Pattern(regex));
    }

    let stage = TscPlugin::new(options).stage(cwd.clone());
    if cli.show_config {
        let config = stage.config().context("failed to resolve configuration")?;
        println!("{}", serde_json::to_string_pretty(&*config)?);
        return Ok(());
    }

    let files = collect_sources(&cli.paths, stage.filter());
    let entries = load_all(&stage, &files).context("failed to resolve configuration")?;

    let mut replaced = 0usize;
    let mut failed = 0usize;
    for entry in &entries {
        match &entry.outcome {
            Ok(Some(result)) => {
                replaced += 1;
                match &cli.out_dir {
                    Some(out_dir) => {
                        let target = output_path(out_dir, &cwd, &entry.path);
                        if let Some(parent) = target.parent() {
                            fs::create_dir_all(parent).with_context(|| {
                                format!("failed to create '{}'", parent.display())
                            })?;
                        }
                        fs::write(&target, &result.contents)
                            .with_context(|| format!("failed to write '{}'", target.display()))?;
                        info!(file = %entry.path.display(), output = %target.display(), "replaced");
                    }
                    None => info!(file = %entry.path.display(), "replaced"),
                }
            }
            Ok(None) => {}
            Err(err) => {
                failed += 1;
                error!(file = %entry.path.display(), error = %err, "transpile failed");
            }
        }
    }

    info!(
        files = entries.len(),
        replaced,
        deferred = entries.len() - replaced - failed,
        failed,
        "done"
    );
    if failed > 0 {
        bail!("{} file(s) failed to transpile", failed);
    }
    Ok(())
}
