//! Config Module
//!
//! Locates, reads and composes the project's `tsconfig.json` once per build
//! session. Composition follows the compiler's `extends` rules for
//! `compilerOptions`; paths inside the configuration are not rebased because
//! nothing in this stage consumes them.
//!
//! After composition, a request for a separate source map is rewritten into
//! an inline map with inline sources. The re-emitted file replaces the
//! bundler's own output wholesale, so an external map would point at text
//! that no longer exists.

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ConfigDiagnostic, Error, Result};
use crate::scan::strip_comments;

pub const DEFAULT_CONFIG_NAME: &str = "tsconfig.json";

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Typed view over `compilerOptions`. Options this stage never reads are kept
/// verbatim in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental_decorators: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emit_decorator_metadata: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_source_map: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_sources: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx_factory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx_fragment_factory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsx_import_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbatim_module_syntax: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_define_for_class_fields: Option<bool>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl CompilerOptions {
    /// Build from a raw `compilerOptions` object. Values of the wrong type are
    /// reported and dropped, the rest of the object still applies.
    pub fn from_map(
        map: Map<String, Value>,
        file: Option<&Path>,
        diagnostics: &mut Vec<ConfigDiagnostic>,
    ) -> Self {
        let mut options = CompilerOptions::default();
        let mut report = |key: &str, expected: &str| {
            diagnostics.push(ConfigDiagnostic::new(
                file.map(Path::to_path_buf),
                format!(
                    "Compiler option '{}' requires a value of type {}.",
                    key, expected
                ),
            ));
        };

        for (key, value) in map {
            match key.as_str() {
                "experimentalDecorators" => {
                    options.experimental_decorators = bool_option(&key, value, &mut report)
                }
                "emitDecoratorMetadata" => {
                    options.emit_decorator_metadata = bool_option(&key, value, &mut report)
                }
                "sourceMap" => options.source_map = bool_option(&key, value, &mut report),
                "inlineSourceMap" => {
                    options.inline_source_map = bool_option(&key, value, &mut report)
                }
                "inlineSources" => options.inline_sources = bool_option(&key, value, &mut report),
                "verbatimModuleSyntax" => {
                    options.verbatim_module_syntax = bool_option(&key, value, &mut report)
                }
                "useDefineForClassFields" => {
                    options.use_define_for_class_fields = bool_option(&key, value, &mut report)
                }
                "target" => options.target = string_option(&key, value, &mut report),
                "jsx" => options.jsx = string_option(&key, value, &mut report),
                "jsxFactory" => options.jsx_factory = string_option(&key, value, &mut report),
                "jsxFragmentFactory" => {
                    options.jsx_fragment_factory = string_option(&key, value, &mut report)
                }
                "jsxImportSource" => {
                    options.jsx_import_source = string_option(&key, value, &mut report)
                }
                _ => {
                    options.other.insert(key, value);
                }
            }
        }

        options
    }

    pub fn emits_decorator_metadata(&self) -> bool {
        self.emit_decorator_metadata.unwrap_or(false)
    }

    /// Whether class fields use define semantics. Unset, the compiler turns
    /// this on only for ES2022 and later targets.
    pub fn uses_define_for_class_fields(&self) -> bool {
        self.use_define_for_class_fields
            .unwrap_or_else(|| self.target.as_deref().is_some_and(target_at_least_es2022))
    }

    /// Replace a separate source map with an inline map carrying its sources.
    /// Returns whether anything changed; a second call is a no-op.
    pub fn inline_source_maps(&mut self) -> bool {
        if self.source_map != Some(true) {
            return false;
        }
        self.source_map = Some(false);
        self.inline_sources = Some(true);
        self.inline_source_map = Some(true);
        true
    }
}

fn target_at_least_es2022(target: &str) -> bool {
    let target = target.to_ascii_lowercase();
    if target == "esnext" {
        return true;
    }
    target
        .strip_prefix("es")
        .and_then(|year| year.parse::<u32>().ok())
        .is_some_and(|year| year >= 2022)
}

fn bool_option(key: &str, value: Value, report: &mut impl FnMut(&str, &str)) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(b),
        Value::Null => None,
        _ => {
            report(key, "boolean");
            None
        }
    }
}

fn string_option(key: &str, value: Value, report: &mut impl FnMut(&str, &str)) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        _ => {
            report(key, "string");
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROJECT CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// `None` when no configuration file was found and defaults apply.
    pub config_path: Option<PathBuf>,
    /// Directory relative paths inside the configuration resolve against.
    pub base_dir: PathBuf,
    #[serde(rename = "compilerOptions")]
    pub options: CompilerOptions,
    /// Non-fatal problems found while composing the configuration.
    pub diagnostics: Vec<ConfigDiagnostic>,
}

impl ProjectConfig {
    pub fn empty(cwd: &Path) -> Self {
        Self {
            config_path: None,
            base_dir: cwd.to_path_buf(),
            options: CompilerOptions::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn emits_decorator_metadata(&self) -> bool {
        self.options.emits_decorator_metadata()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATION & LOOKUP
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigLocation {
    /// Search upward for `tsconfig.json`; absence means default options.
    #[default]
    Default,
    /// Search upward for this path; absence is a hard failure.
    Explicit(PathBuf),
}

impl ConfigLocation {
    pub fn from_option(path: Option<PathBuf>) -> Self {
        match path {
            Some(p) if p.as_os_str() != DEFAULT_CONFIG_NAME => ConfigLocation::Explicit(p),
            _ => ConfigLocation::Default,
        }
    }

    pub fn file_name(&self) -> &Path {
        match self {
            ConfigLocation::Default => Path::new(DEFAULT_CONFIG_NAME),
            ConfigLocation::Explicit(p) => p,
        }
    }
}

/// Walk from `cwd` towards the filesystem root and return the first
/// `<dir>/<name>` that is a file. An absolute `name` is checked as-is.
pub fn find_config_file(cwd: &Path, name: &Path) -> Option<PathBuf> {
    cwd.ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Resolve and normalize the configuration for one build session.
pub fn resolve_project_config(location: &ConfigLocation, cwd: &Path) -> Result<ProjectConfig> {
    let Some(path) = find_config_file(cwd, location.file_name()) else {
        return match location {
            ConfigLocation::Explicit(requested) => Err(Error::ConfigNotFound {
                path: requested.clone(),
                cwd: cwd.to_path_buf(),
            }),
            ConfigLocation::Default => {
                debug!(cwd = %cwd.display(), "no tsconfig.json found, using defaults");
                Ok(ProjectConfig::empty(cwd))
            }
        };
    };

    let mut diagnostics = Vec::new();
    let mut chain = Vec::new();
    let compiler_options = load_compiler_options(&path, &mut chain, &mut diagnostics)?;
    let mut options = CompilerOptions::from_map(compiler_options, Some(&path), &mut diagnostics);

    if !diagnostics.is_empty() {
        warn!(config = %path.display(), ?diagnostics, "tsconfig reported diagnostics");
    }
    if options.inline_source_maps() {
        debug!(config = %path.display(), "rewrote sourceMap to inlineSourceMap with inlineSources");
    }

    Ok(ProjectConfig {
        base_dir: path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf()),
        config_path: Some(path),
        options,
        diagnostics,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// READING & COMPOSITION
// ═══════════════════════════════════════════════════════════════════════════════

/// Read one configuration file in the compiler's JSON dialect (comments and
/// trailing commas allowed). Syntax errors are fatal.
pub fn read_config_json(path: &Path) -> Result<Map<String, Value>> {
    let text = fs::read_to_string(path).map_err(|source| Error::ConfigUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let cleaned = strip_trailing_commas(&strip_comments(text.trim_start_matches('\u{feff}')));
    if cleaned.trim().is_empty() {
        return Ok(Map::new());
    }

    let diagnostic = match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(_) => ConfigDiagnostic::new(
            Some(path.to_path_buf()),
            "The root value of a tsconfig.json file must be an object.",
        ),
        Err(e) => ConfigDiagnostic::at(path.to_path_buf(), e.line(), e.column(), e.to_string()),
    };

    warn!(config = %path.display(), diagnostics = ?[&diagnostic], "tsconfig could not be parsed");
    Err(Error::ConfigParse {
        path: path.to_path_buf(),
        diagnostics: vec![diagnostic],
    })
}

/// Compose `compilerOptions` along the `extends` chain rooted at `path`.
/// `chain` holds the files currently being composed, for cycle detection.
fn load_compiler_options(
    path: &Path,
    chain: &mut Vec<PathBuf>,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> Result<Map<String, Value>> {
    if chain.iter().any(|p| p == path) {
        let cycle = chain
            .iter()
            .chain(std::iter::once(&path.to_path_buf()))
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        let diagnostic = ConfigDiagnostic::new(
            Some(path.to_path_buf()),
            format!("Circularity detected while resolving configuration: {}", cycle),
        );
        warn!(diagnostics = ?[&diagnostic], "tsconfig extends chain is circular");
        return Err(Error::ConfigParse {
            path: path.to_path_buf(),
            diagnostics: vec![diagnostic],
        });
    }

    let mut raw = read_config_json(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    chain.push(path.to_path_buf());

    let mut merged = Map::new();
    for spec in extends_specifiers(raw.remove("extends"), path, diagnostics) {
        let Some(base) = resolve_extends(&spec, dir) else {
            let diagnostic = ConfigDiagnostic::new(
                Some(path.to_path_buf()),
                format!("File '{}' not found.", spec),
            );
            warn!(diagnostics = ?[&diagnostic], "tsconfig extends target is missing");
            return Err(Error::ConfigNotFound {
                path: PathBuf::from(spec),
                cwd: dir.to_path_buf(),
            });
        };
        merged.extend(load_compiler_options(&base, chain, diagnostics)?);
    }

    match raw.remove("compilerOptions") {
        Some(Value::Object(own)) => merged.extend(own),
        Some(Value::Null) | None => {}
        Some(_) => diagnostics.push(ConfigDiagnostic::new(
            Some(path.to_path_buf()),
            "Compiler option 'compilerOptions' requires a value of type object.",
        )),
    }

    chain.pop();
    Ok(merged)
}

fn extends_specifiers(
    value: Option<Value>,
    path: &Path,
    diagnostics: &mut Vec<ConfigDiagnostic>,
) -> Vec<String> {
    let mut invalid = || {
        diagnostics.push(ConfigDiagnostic::new(
            Some(path.to_path_buf()),
            "Compiler option 'extends' requires a value of type string or Array.",
        ))
    };

    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => {
                    invalid();
                    None
                }
            })
            .collect(),
        Some(_) => {
            invalid();
            Vec::new()
        }
    }
}

/// Relative and absolute specifiers resolve against the extending file's
/// directory; bare specifiers resolve through `node_modules`.
fn resolve_extends(spec: &str, dir: &Path) -> Option<PathBuf> {
    let is_relative = spec.starts_with("./") || spec.starts_with("../");
    if is_relative || Path::new(spec).is_absolute() {
        return json_file_candidates(&dir.join(spec))
            .into_iter()
            .find(|c| c.is_file());
    }

    dir.ancestors()
        .map(|ancestor| ancestor.join("node_modules").join(spec))
        .flat_map(|base| {
            let mut candidates = json_file_candidates(&base);
            candidates.push(base.join(DEFAULT_CONFIG_NAME));
            candidates
        })
        .find(|c| c.is_file())
}

fn json_file_candidates(base: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![base.to_path_buf()];
    if base.extension().map_or(true, |ext| ext != "json") {
        let mut with_ext = base.as_os_str().to_owned();
        with_ext.push(".json");
        candidates.push(PathBuf::from(with_ext));
    }
    candidates
}

/// Drop commas that directly precede `}` or `]`. Expects comment-free input.
fn strip_trailing_commas(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }

    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION RESOLVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves the configuration at most once, even when the first files of a
/// build arrive concurrently. A failed resolution is not memoized.
#[derive(Debug)]
pub struct ConfigResolver {
    location: ConfigLocation,
    cwd: PathBuf,
    resolved: OnceCell<Arc<ProjectConfig>>,
}

impl ConfigResolver {
    pub fn new(location: ConfigLocation, cwd: PathBuf) -> Self {
        Self {
            location,
            cwd,
            resolved: OnceCell::new(),
        }
    }

    pub fn location(&self) -> &ConfigLocation {
        &self.location
    }

    pub fn resolve(&self) -> Result<Arc<ProjectConfig>> {
        self.resolved
            .get_or_try_init(|| resolve_project_config(&self.location, &self.cwd).map(Arc::new))
            .map(Arc::clone)
    }
}
