use crate::languages::{shell_quote, Language, LanguageConfig, LanguageRegistry};
use std::path::Path;

fn run_script(source: &Path) -> String {
    format!("sh {}", shell_quote(source))
}

fn run_artifact(source: &Path) -> String {
    format!("sh {}.out", shell_quote(source))
}

/// Toolchains built from `sh` alone. Python runs the code as a shell
/// script, C syntax-checks it with `sh -n` first, C++ "compiles" by copying
/// it to a `.out` artifact and runs that.
pub(crate) fn fake_registry() -> LanguageRegistry {
    LanguageRegistry::empty()
        .with_config(LanguageConfig {
            language: Language::Python,
            file_extension: "py".into(),
            source_file: "main.py".into(),
            compile_command: None,
            run_command: run_script,
            toolchain: vec!["sh"],
        })
        .with_config(LanguageConfig {
            language: Language::C,
            file_extension: "c".into(),
            source_file: "main.c".into(),
            compile_command: Some("sh -n {source}".into()),
            run_command: run_script,
            toolchain: vec!["sh"],
        })
        .with_config(LanguageConfig {
            language: Language::Cpp,
            file_extension: "cpp".into(),
            source_file: "main.cpp".into(),
            compile_command: Some("cp {source} {source}.out".into()),
            run_command: run_artifact,
            toolchain: vec!["sh", "cp"],
        })
}
