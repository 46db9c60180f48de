//! Selection Module
//!
//! Decides per file whether the full transpile pass runs. One policy is
//! fixed per build at setup time.

use once_cell::unsync::OnceCell;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::config::ProjectConfig;
use crate::scan::has_decorator_usage;

pub type SelectionPredicate = Arc<dyn Fn(&Path, &ProjectConfig) -> bool + Send + Sync>;

// ═══════════════════════════════════════════════════════════════════════════════
// FILE UNIT
// ═══════════════════════════════════════════════════════════════════════════════

/// One candidate file. Contents are read at most once, and only when asked for.
pub struct FileUnit<'a> {
    path: &'a Path,
    contents: OnceCell<Option<String>>,
}

impl<'a> FileUnit<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self {
            path,
            contents: OnceCell::new(),
        }
    }

    /// Build a unit whose contents are already known.
    pub fn with_contents(path: &'a Path, contents: String) -> Self {
        Self {
            path,
            contents: OnceCell::with_value(Some(contents)),
        }
    }

    pub fn path(&self) -> &Path {
        self.path
    }

    /// `None` when the file could not be read; the failure is logged once.
    pub fn contents(&self) -> Option<&str> {
        self.contents
            .get_or_init(|| match fs::read_to_string(self.path) {
                Ok(text) => Some(text),
                Err(err) => {
                    warn!(file = %self.path.display(), error = %err, "failed to read source file");
                    None
                }
            })
            .as_deref()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTION POLICY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Default)]
pub enum SelectionPolicy {
    /// `emitDecoratorMetadata` is on and the file text looks like it uses a decorator.
    #[default]
    DecoratorScan,
    /// `emitDecoratorMetadata` is on; contents are not inspected.
    MetadataFlag,
    /// Caller decides, regardless of the configuration flags.
    Predicate(SelectionPredicate),
}

impl SelectionPolicy {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Path, &ProjectConfig) -> bool + Send + Sync + 'static,
    {
        SelectionPolicy::Predicate(Arc::new(f))
    }

    /// Transpile every offered file.
    pub fn always() -> Self {
        Self::predicate(|_, _| true)
    }

    /// Parse the names accepted by the CLI and the JS bindings.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "decorators" => Some(SelectionPolicy::DecoratorScan),
            "metadata" => Some(SelectionPolicy::MetadataFlag),
            "always" => Some(SelectionPolicy::always()),
            _ => None,
        }
    }

    pub fn select(&self, file: &FileUnit<'_>, config: &ProjectConfig) -> bool {
        match self {
            SelectionPolicy::DecoratorScan => {
                config.emits_decorator_metadata()
                    && file.contents().map_or(false, has_decorator_usage)
            }
            SelectionPolicy::MetadataFlag => config.emits_decorator_metadata(),
            SelectionPolicy::Predicate(f) => f(file.path(), config),
        }
    }
}

impl fmt::Debug for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::DecoratorScan => write!(f, "DecoratorScan"),
            SelectionPolicy::MetadataFlag => write!(f, "MetadataFlag"),
            SelectionPolicy::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}
