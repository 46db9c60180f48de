//! JS bindings for bundlers whose plugin API lives in Node (esbuild, Rolldown).
//!
//! The JS side registers an `onLoad` hook with `plugin.filter` and forwards
//! each path to `plugin.load`, returning its result (or `undefined` for null).

use napi_derive::napi;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::plugin::{FileFilter, PluginOptions, TransformStage, TscPlugin, PLUGIN_NAME};
use crate::selector::SelectionPolicy;

#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct NativePluginOptions {
    pub tsconfig_path: Option<String>,
    /// Regex source replacing the default `\.tsx?$`. There is no predicate
    /// form here: JS callers filter on their side, using `resolvedConfig()`,
    /// before forwarding a path to `load`.
    pub filter: Option<String>,
    /// `"decorators"` (default), `"metadata"` or `"always"`.
    pub policy: Option<String>,
    pub cwd: Option<String>,
}

#[napi(object)]
#[derive(Debug, Clone)]
pub struct NativeLoadResult {
    pub contents: String,
}

#[napi]
pub struct TscPluginNative {
    stage: TransformStage,
}

#[napi]
impl TscPluginNative {
    #[napi(constructor)]
    pub fn new(options: Option<NativePluginOptions>) -> napi::Result<Self> {
        let options = options.unwrap_or_default();
        let mut plugin_options = PluginOptions::default();

        if let Some(path) = options.tsconfig_path {
            plugin_options = plugin_options.tsconfig_path(path);
        }
        if let Some(name) = options.policy.as_deref() {
            let policy = SelectionPolicy::from_name(name)
                .ok_or_else(|| napi::Error::from_reason(format!("Unknown policy '{}'", name)))?;
            plugin_options = plugin_options.policy(policy);
        }
        if let Some(pattern) = options.filter.as_deref() {
            let regex = Regex::new(pattern)
                .map_err(|e| napi::Error::from_reason(format!("Invalid filter: {}", e)))?;
            plugin_options = plugin_options.filter(FileFilter::Pattern(regex));
        }

        let cwd = match options.cwd {
            Some(cwd) => PathBuf::from(cwd),
            None => std::env::current_dir()
                .map_err(|e| napi::Error::from_reason(format!("Invalid cwd: {}", e)))?,
        };

        Ok(Self {
            stage: TscPlugin::new(plugin_options).stage(cwd),
        })
    }

    #[napi(getter)]
    pub fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    #[napi(getter)]
    pub fn filter(&self) -> String {
        self.stage.filter().as_str().to_string()
    }

    /// The session's resolved configuration, resolving it if needed.
    #[napi]
    pub fn resolved_config(&self) -> napi::Result<serde_json::Value> {
        let config = self
            .stage
            .config()
            .map_err(|e| napi::Error::from_reason(e.to_string()))?;
        serde_json::to_value(&*config)
            .map_err(|e| napi::Error::from_reason(format!("Invalid config: {}", e)))
    }

    #[napi]
    pub fn load(&self, path: String) -> napi::Result<Option<NativeLoadResult>> {
        let result = self
            .stage
            .load(Path::new(&path))
            .map_err(|e| napi::Error::from_reason(e.to_string()))?;
        Ok(result.map(|r| NativeLoadResult {
            contents: r.contents,
        }))
    }
}
