//! Host-level tests: registration, per-file decisions and delegation.

#[cfg(test)]
mod tests {
    use crate::config::CompilerOptions;
    use crate::error::{Error, Result};
    use crate::plugin::{
        FileFilter, LoadResult, OnLoadArgs, OnLoadCallback, Plugin, PluginBuild, PluginOptions,
        TscPlugin, PLUGIN_NAME,
    };
    use crate::selector::SelectionPolicy;
    use crate::transpile::Transpiler;
    use regex::Regex;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::tempdir;

    // ═══════════════════════════════════════════════════════════════════════════════
    // TEST HOST
    // ═══════════════════════════════════════════════════════════════════════════════

    struct RecordingBuild {
        cwd: PathBuf,
        handlers: Vec<(Regex, OnLoadCallback)>,
    }

    impl RecordingBuild {
        fn new(cwd: &Path) -> Self {
            Self {
                cwd: cwd.to_path_buf(),
                handlers: Vec::new(),
            }
        }

        fn load(&self, path: &Path) -> Result<Option<LoadResult>> {
            let args = OnLoadArgs {
                path: path.to_path_buf(),
            };
            for (filter, callback) in &self.handlers {
                if filter.is_match(&path.to_string_lossy()) {
                    if let Some(result) = callback(&args)? {
                        return Ok(Some(result));
                    }
                }
            }
            Ok(None)
        }
    }

    impl PluginBuild for RecordingBuild {
        fn cwd(&self) -> PathBuf {
            self.cwd.clone()
        }

        fn on_load(&mut self, filter: Regex, callback: OnLoadCallback) {
            self.handlers.push((filter, callback));
        }
    }

    /// Tags its output so tests can see the delegate ran.
    #[derive(Default)]
    struct TaggingTranspiler;

    impl Transpiler for TaggingTranspiler {
        fn transpile(
            &self,
            source: &str,
            file_name: &str,
            _options: &CompilerOptions,
        ) -> Result<String> {
            Ok(format!("/* {} */\n{}", file_name, source))
        }
    }

    fn project(tsconfig: Option<&str>, files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        if let Some(tsconfig) = tsconfig {
            fs::write(dir.path().join("tsconfig.json"), tsconfig).unwrap();
        }
        for (name, contents) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        dir
    }

    const METADATA_CONFIG: &str =
        r#"{ "compilerOptions": { "experimentalDecorators": true, "emitDecoratorMetadata": true } }"#;
    const DECORATED: &str = "@Injectable()\nexport class Service {}\n";
    const PLAIN: &str = "export const answer = 42;\n";

    // ═══════════════════════════════════════════════════════════════════════════════
    // REGISTRATION
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_plugin_defaults() {
        let plugin = TscPlugin::new(PluginOptions::default());
        assert_eq!(plugin.name(), PLUGIN_NAME);
        assert_eq!(plugin.options().tsconfig_path, None);
        assert_eq!(plugin.options().include().as_str(), r"\.tsx?$");
        assert!(matches!(
            plugin.options().selection(),
            SelectionPolicy::DecoratorScan
        ));
    }

    #[test]
    fn test_setup_registers_single_handler() {
        let dir = project(None, &[]);
        let plugin = TscPlugin::new(PluginOptions::default());
        let mut build = RecordingBuild::new(dir.path());
        plugin.setup(&mut build).unwrap();
        assert_eq!(build.handlers.len(), 1);
        assert_eq!(build.handlers[0].0.as_str(), r"\.tsx?$");
    }

    #[test]
    fn test_pattern_filter_replaces_extension_gate() {
        let options = PluginOptions::default()
            .filter(FileFilter::Pattern(Regex::new(r"\.mts$").unwrap()));
        assert_eq!(options.include().as_str(), r"\.mts$");
        assert!(matches!(options.selection(), SelectionPolicy::DecoratorScan));
    }

    #[test]
    fn test_predicate_filter_replaces_gate_and_policy() {
        let options = PluginOptions::default()
            .filter(FileFilter::predicate(|_, _| true));
        assert!(options.include().is_match("styles.css"));
        assert!(matches!(options.selection(), SelectionPolicy::Predicate(_)));
    }

    #[test]
    fn test_predicate_filter_survives_later_policy() {
        let dir = project(
            Some(METADATA_CONFIG),
            &[
                ("user.entity.ts", PLAIN),
                ("styles.css", "body { color: red; }\n"),
            ],
        );
        let options = PluginOptions::default()
            .filter(FileFilter::predicate(|path, _| {
                path.to_string_lossy().ends_with(".entity.ts")
            }))
            .policy(SelectionPolicy::MetadataFlag);
        assert!(matches!(options.selection(), SelectionPolicy::Predicate(_)));

        let plugin = TscPlugin::with_transpiler(options, TaggingTranspiler::default());
        let stage = plugin.stage(dir.path().to_path_buf());
        assert_eq!(stage.load(&dir.path().join("styles.css")).unwrap(), None);
        assert!(stage.load(&dir.path().join("user.entity.ts")).unwrap().is_some());
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // DECISIONS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_no_config_defers_every_file() {
        let dir = project(None, &[("service.ts", DECORATED)]);
        let transpiler = TaggingTranspiler::default();
        let plugin = TscPlugin::with_transpiler(PluginOptions::default(), transpiler);
        let mut build = RecordingBuild::new(dir.path());
        plugin.setup(&mut build).unwrap();

        assert_eq!(build.load(&dir.path().join("service.ts")).unwrap(), None);
    }

    #[test]
    fn test_decorated_file_is_replaced_plain_file_deferred() {
        let dir = project(
            Some(METADATA_CONFIG),
            &[("src/service.ts", DECORATED), ("src/plain.ts", PLAIN)],
        );
        let plugin = TscPlugin::with_transpiler(PluginOptions::default(), TaggingTranspiler::default());
        let mut build = RecordingBuild::new(dir.path());
        plugin.setup(&mut build).unwrap();

        let replaced = build
            .load(&dir.path().join("src/service.ts"))
            .unwrap()
            .unwrap();
        assert!(replaced.contents.starts_with("/* service.ts */"));
        assert_eq!(build.load(&dir.path().join("src/plain.ts")).unwrap(), None);
    }

    #[test]
    fn test_non_matching_extension_never_offered() {
        let dir = project(Some(METADATA_CONFIG), &[("legacy.js", DECORATED)]);
        let plugin = TscPlugin::with_transpiler(
            PluginOptions::default().policy(SelectionPolicy::always()),
            TaggingTranspiler::default(),
        );
        let mut build = RecordingBuild::new(dir.path());
        plugin.setup(&mut build).unwrap();

        assert_eq!(build.load(&dir.path().join("legacy.js")).unwrap(), None);
    }

    #[test]
    fn test_metadata_policy_transpiles_plain_files() {
        let dir = project(Some(METADATA_CONFIG), &[("plain.ts", PLAIN)]);
        let plugin = TscPlugin::with_transpiler(
            PluginOptions::default().policy(SelectionPolicy::MetadataFlag),
            TaggingTranspiler::default(),
        );
        let stage = plugin.stage(dir.path().to_path_buf());
        assert!(stage.load(&dir.path().join("plain.ts")).unwrap().is_some());
    }

    #[test]
    fn test_predicate_matches_exactly_regardless_of_flag() {
        for tsconfig in [None, Some(METADATA_CONFIG)] {
            let dir = project(
                tsconfig,
                &[("user.entity.ts", PLAIN), ("user.service.ts", DECORATED)],
            );
            let options = PluginOptions::default().filter(FileFilter::predicate(|path, _| {
                path.to_string_lossy().ends_with(".entity.ts")
            }));
            let plugin = TscPlugin::with_transpiler(options, TaggingTranspiler::default());
            let stage = plugin.stage(dir.path().to_path_buf());

            assert!(stage.load(&dir.path().join("user.entity.ts")).unwrap().is_some());
            assert!(stage.load(&dir.path().join("user.service.ts")).unwrap().is_none());
        }
    }

    #[test]
    fn test_unreadable_source_defers() {
        let dir = project(Some(METADATA_CONFIG), &[]);
        let plugin = TscPlugin::with_transpiler(PluginOptions::default(), TaggingTranspiler::default());
        let stage = plugin.stage(dir.path().to_path_buf());
        assert_eq!(stage.load(&dir.path().join("missing.ts")).unwrap(), None);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CONFIGURATION THROUGH THE HOST
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_missing_explicit_config_fails_each_load() {
        let dir = project(None, &[("service.ts", DECORATED)]);
        let plugin = TscPlugin::new(PluginOptions::default().tsconfig_path("tsconfig.app.json"));
        let mut build = RecordingBuild::new(dir.path());
        plugin.setup(&mut build).unwrap();

        for _ in 0..2 {
            let err = build.load(&dir.path().join("service.ts")).unwrap_err();
            assert!(matches!(err, Error::ConfigNotFound { .. }));
        }
    }

    #[test]
    fn test_resolved_options_reach_transpiler() {
        struct AssertingTranspiler;
        impl Transpiler for AssertingTranspiler {
            fn transpile(&self, source: &str, _: &str, options: &CompilerOptions) -> Result<String> {
                assert_eq!(options.source_map, Some(false));
                assert_eq!(options.inline_source_map, Some(true));
                assert_eq!(options.inline_sources, Some(true));
                Ok(source.to_string())
            }
        }

        let dir = project(
            Some(r#"{ "compilerOptions": { "emitDecoratorMetadata": true, "sourceMap": true } }"#),
            &[("service.ts", DECORATED)],
        );
        let plugin = TscPlugin::with_transpiler(PluginOptions::default(), AssertingTranspiler);
        let stage = plugin.stage(dir.path().to_path_buf());
        assert!(stage.load(&dir.path().join("service.ts")).unwrap().is_some());
    }

    #[test]
    fn test_concurrent_first_loads_share_one_config() {
        let dir = project(
            Some(METADATA_CONFIG),
            &[("a.ts", DECORATED), ("b.ts", DECORATED), ("c.ts", DECORATED)],
        );
        let plugin = TscPlugin::with_transpiler(PluginOptions::default(), TaggingTranspiler::default());
        let stage = plugin.stage(dir.path().to_path_buf());

        std::thread::scope(|s| {
            for name in ["a.ts", "b.ts", "c.ts"] {
                let stage = &stage;
                let path = dir.path().join(name);
                s.spawn(move || assert!(stage.load(&path).unwrap().is_some()));
            }
        });
        assert!(Arc::ptr_eq(&stage.config().unwrap(), &stage.config().unwrap()));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // END TO END
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_end_to_end_emits_metadata() {
        let source = r#"
import { Injectable } from "./di";
import { Repository } from "./repository";

@Injectable()
export class UserService {
    constructor(private readonly users: Repository) {}
}
"#;
        let dir = project(Some(METADATA_CONFIG), &[("src/user.service.ts", source)]);
        let plugin = TscPlugin::new(PluginOptions::default());
        let mut build = RecordingBuild::new(dir.path());
        plugin.setup(&mut build).unwrap();

        let output = build
            .load(&dir.path().join("src/user.service.ts"))
            .unwrap()
            .unwrap();
        assert!(output.contents.contains("design:paramtypes"));
        assert!(output.contents.contains("Repository"));
    }
}
