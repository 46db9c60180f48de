//! # tsc Transform Stage
//!
//! A bundler transform stage that re-emits TypeScript files with decorator
//! metadata (`design:type`, `design:paramtypes`, `design:returntype`), which
//! fast bundler transpilers do not produce.
//!
//! ## Pipeline
//!
//! 1. **Config**: `tsconfig.json` is located and composed once per build
//!    session. A separate `sourceMap` is rewritten to an inline map.
//! 2. **Selection**: a path pattern gates which files are offered, then a
//!    single `SelectionPolicy` decides whether the file needs the full pass.
//! 3. **Transpile**: selected files go through oxc with legacy decorators and
//!    metadata enabled; the output replaces the bundler's own transform.
//!
//! Declined files return `None` and the host keeps its default handling.
//!
//! Replaced output imports decorator helpers from `@oxc-project/runtime`, so
//! projects using this stage need that package installed.

mod batch;
mod config;
mod error;
mod plugin;
mod scan;
mod selector;
mod transpile;

#[cfg(feature = "napi")]
mod bridge;

#[cfg(test)]
mod plugin_tests;

pub use batch::{collect_sources, load_all, BatchEntry};
pub use config::{
    find_config_file, resolve_project_config, CompilerOptions, ConfigLocation, ConfigResolver,
    ProjectConfig, DEFAULT_CONFIG_NAME,
};
pub use error::{ConfigDiagnostic, Error, Result};
pub use plugin::{
    FileFilter, LoadResult, OnLoadArgs, OnLoadCallback, Plugin, PluginBuild, PluginOptions,
    TransformStage, TscPlugin, DEFAULT_FILTER, PLUGIN_NAME,
};
pub use scan::{has_decorator, has_decorator_usage, strip_comments};
pub use selector::{FileUnit, SelectionPolicy, SelectionPredicate};
pub use transpile::{transform_options, OxcTranspiler, Transpiler};

#[cfg(feature = "napi")]
pub use bridge::{NativeLoadResult, NativePluginOptions, TscPluginNative};
