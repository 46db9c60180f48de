//! Plugin Module
//!
//! Registration with the host bundler. The host offers every path matching
//! the registered filter; the stage either declines (the host keeps its own
//! fast transform) or returns replacement contents.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::{ConfigLocation, ConfigResolver, ProjectConfig};
use crate::error::Result;
use crate::selector::{FileUnit, SelectionPolicy, SelectionPredicate};
use crate::transpile::{OxcTranspiler, Transpiler};

pub const PLUGIN_NAME: &str = "tsc";

lazy_static! {
    /// `.ts` and `.tsx` sources.
    pub static ref DEFAULT_FILTER: Regex = Regex::new(r"\.tsx?$").unwrap();
    static ref ANY_PATH: Regex = Regex::new(r".*").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOST CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct OnLoadArgs {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub contents: String,
}

/// `Ok(None)` defers to the host's default handling.
pub type OnLoadCallback = Arc<dyn Fn(&OnLoadArgs) -> Result<Option<LoadResult>> + Send + Sync>;

/// What the host exposes to a plugin during setup.
pub trait PluginBuild {
    fn cwd(&self) -> PathBuf;
    fn on_load(&mut self, filter: Regex, callback: OnLoadCallback);
}

pub trait Plugin {
    fn name(&self) -> &str;
    fn setup(&self, build: &mut dyn PluginBuild) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Caller-supplied narrowing of which files take the full pass.
#[derive(Clone)]
pub enum FileFilter {
    /// Replaces the default extension pattern.
    Pattern(Regex),
    /// Replaces both the extension pattern and the selection policy.
    Predicate(SelectionPredicate),
}

impl FileFilter {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Path, &ProjectConfig) -> bool + Send + Sync + 'static,
    {
        FileFilter::Predicate(Arc::new(f))
    }
}

impl std::fmt::Debug for FileFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFilter::Pattern(pattern) => f.debug_tuple("Pattern").field(pattern).finish(),
            FileFilter::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// The gate and the policy are derived from `filter` and `policy` together,
/// so a predicate filter wins regardless of builder call order.
#[derive(Debug, Clone, Default)]
pub struct PluginOptions {
    /// `None` searches upward for `tsconfig.json`.
    pub tsconfig_path: Option<PathBuf>,
    filter: Option<FileFilter>,
    policy: SelectionPolicy,
}

impl PluginOptions {
    pub fn tsconfig_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tsconfig_path = Some(path.into());
        self
    }

    /// Ignored while a predicate filter is set.
    pub fn policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn filter(mut self, filter: FileFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Paths the host should offer to the stage.
    pub fn include(&self) -> &Regex {
        match &self.filter {
            None => &*DEFAULT_FILTER,
            Some(FileFilter::Pattern(pattern)) => pattern,
            Some(FileFilter::Predicate(_)) => &*ANY_PATH,
        }
    }

    /// The policy applied to every offered path.
    pub fn selection(&self) -> SelectionPolicy {
        match &self.filter {
            Some(FileFilter::Predicate(predicate)) => {
                SelectionPolicy::Predicate(Arc::clone(predicate))
            }
            _ => self.policy.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM STAGE
// ═══════════════════════════════════════════════════════════════════════════════

/// One build session: the configuration is resolved on first use and shared
/// read-only by every file callback after that.
pub struct TransformStage<T = OxcTranspiler> {
    resolver: ConfigResolver,
    include: Regex,
    policy: SelectionPolicy,
    transpiler: Arc<T>,
}

impl<T: Transpiler> TransformStage<T> {
    pub fn new(options: &PluginOptions, cwd: PathBuf, transpiler: Arc<T>) -> Self {
        Self {
            resolver: ConfigResolver::new(
                ConfigLocation::from_option(options.tsconfig_path.clone()),
                cwd,
            ),
            include: options.include().clone(),
            policy: options.selection(),
            transpiler,
        }
    }

    pub fn filter(&self) -> &Regex {
        &self.include
    }

    pub fn config(&self) -> Result<Arc<ProjectConfig>> {
        self.resolver.resolve()
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.include.is_match(&path.to_string_lossy())
    }

    /// The per-file callback: decline, or return the full compiler's output.
    pub fn load(&self, path: &Path) -> Result<Option<LoadResult>> {
        if !self.matches(path) {
            return Ok(None);
        }
        let config = self.config()?;
        let file = FileUnit::new(path);

        if !self.policy.select(&file, &config) {
            debug!(file = %path.display(), "deferring to host transform");
            return Ok(None);
        }
        let Some(source) = file.contents() else {
            return Ok(None);
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let contents = self
            .transpiler
            .transpile(source, &file_name, &config.options)?;

        debug!(file = %path.display(), "replaced host transform");
        Ok(Some(LoadResult { contents }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TscPlugin<T = OxcTranspiler> {
    options: PluginOptions,
    transpiler: Arc<T>,
}

impl TscPlugin<OxcTranspiler> {
    pub fn new(options: PluginOptions) -> Self {
        Self::with_transpiler(options, OxcTranspiler)
    }
}

impl<T: Transpiler + 'static> TscPlugin<T> {
    pub fn with_transpiler(options: PluginOptions, transpiler: T) -> Self {
        Self {
            options,
            transpiler: Arc::new(transpiler),
        }
    }

    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    /// Start a build session rooted at `cwd`.
    pub fn stage(&self, cwd: PathBuf) -> TransformStage<T> {
        TransformStage::new(&self.options, cwd, Arc::clone(&self.transpiler))
    }
}

impl<T: Transpiler + 'static> Plugin for TscPlugin<T> {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn setup(&self, build: &mut dyn PluginBuild) -> Result<()> {
        let stage = Arc::new(self.stage(build.cwd()));
        let filter = stage.filter().clone();
        build.on_load(filter, Arc::new(move |args: &OnLoadArgs| stage.load(&args.path)));
        Ok(())
    }
}
