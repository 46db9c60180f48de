//! Transpile Module
//!
//! Single-file TypeScript transpilation through oxc, with legacy decorators
//! and `design:*` metadata emission driven by the resolved compiler options.
//! Output is returned verbatim; failures propagate to the host.
//!
//! oxc has no inline helper mode, so decorated output imports its helpers
//! (`decorate`, `decorateMetadata`, `defineProperty`) from
//! `@oxc-project/runtime/helpers/*`. The host project must be able to resolve
//! that package.

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{EnvOptions, JsxRuntime, TransformOptions, Transformer};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::CompilerOptions;
use crate::error::{Error, Result};

/// The full compiler, reduced to the one operation this stage needs.
pub trait Transpiler: Send + Sync {
    /// `file_name` is the basename, used for diagnostics and source map naming.
    fn transpile(&self, source: &str, file_name: &str, options: &CompilerOptions)
        -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OxcTranspiler;

impl Transpiler for OxcTranspiler {
    fn transpile(
        &self,
        source: &str,
        file_name: &str,
        options: &CompilerOptions,
    ) -> Result<String> {
        let allocator = Allocator::default();
        let path = Path::new(file_name);
        let source_type = SourceType::from_path(path).unwrap_or_else(|_| {
            SourceType::default()
                .with_typescript(true)
                .with_module(true)
        });

        let parsed = Parser::new(&allocator, source, source_type).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            return Err(transpile_error(file_name, &parsed.errors));
        }
        let mut program = parsed.program;

        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();
        let transform_options = transform_options(options);
        let transformed = Transformer::new(&allocator, path, &transform_options)
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(transpile_error(file_name, &transformed.errors));
        }

        let inline_map = options.inline_source_map.unwrap_or(false);
        let generated = Codegen::new()
            .with_options(CodegenOptions {
                source_map_path: inline_map.then(|| path.to_path_buf()),
                ..CodegenOptions::default()
            })
            .build(&program);

        let mut output = generated.code;
        if let Some(map) = generated.map {
            if !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str("//# sourceMappingURL=");
            output.push_str(&map.to_data_url());
            output.push('\n');
        }

        debug!(file = file_name, bytes = output.len(), "transpiled");
        Ok(output)
    }
}

fn transpile_error<D: std::fmt::Display>(file_name: &str, errors: &[D]) -> Error {
    Error::Transpile {
        file: file_name.to_string(),
        diagnostics: errors.iter().map(|e| e.to_string()).collect(),
    }
}

/// Map the compiler options this stage understands onto oxc's transform options.
pub fn transform_options(options: &CompilerOptions) -> TransformOptions {
    let mut transform = TransformOptions::default();

    let emit_metadata = options.emits_decorator_metadata();
    transform.decorator.legacy = options.experimental_decorators.unwrap_or(false) || emit_metadata;
    transform.decorator.emit_decorator_metadata = emit_metadata;
    transform.typescript.only_remove_type_imports =
        options.verbatim_module_syntax.unwrap_or(false);
    if !options.uses_define_for_class_fields() {
        transform.typescript.remove_class_fields_without_initializer = true;
        transform.assumptions.set_public_class_fields = true;
    }

    if let Some(target) = &options.target {
        match EnvOptions::from_target(&target.to_ascii_lowercase()) {
            Ok(env) => transform.env = env,
            Err(err) => warn!(target = %target, error = %err, "ignoring unsupported target"),
        }
    }

    match options.jsx.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("preserve") | Some("react-native") => transform.jsx.jsx_plugin = false,
        Some("react") => transform.jsx.runtime = JsxRuntime::Classic,
        Some("react-jsx") => transform.jsx.runtime = JsxRuntime::Automatic,
        Some("react-jsxdev") => {
            transform.jsx.runtime = JsxRuntime::Automatic;
            transform.jsx.development = true;
        }
        _ => {}
    }
    if let Some(factory) = &options.jsx_factory {
        transform.jsx.pragma = Some(factory.clone());
    }
    if let Some(fragment) = &options.jsx_fragment_factory {
        transform.jsx.pragma_frag = Some(fragment.clone());
    }
    if let Some(import_source) = &options.jsx_import_source {
        transform.jsx.import_source = Some(import_source.clone());
    }

    transform
}
