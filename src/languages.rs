//! Language table: where each supported language's source goes and which
//! commands compile and run it.

use crate::error::{GraderError, GraderResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Javascript,
    Python,
    Java,
    C,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Javascript,
        Language::Python,
        Language::Java,
        Language::C,
        Language::Cpp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Javascript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str() == lowered)
            .ok_or_else(|| GraderError::UnsupportedLanguage(s.to_string()))
    }
}

/// Toolchain for one language.
///
/// `compile_command` is a shell template; `{source}` expands to the quoted
/// source path and `{dir}` to the quoted scratch directory. Every occurrence
/// is replaced.
#[derive(Clone)]
pub struct LanguageConfig {
    pub language: Language,
    pub file_extension: String,
    /// File name the source is written under inside the scratch directory.
    pub source_file: String,
    pub compile_command: Option<String>,
    pub run_command: fn(&Path) -> String,
    /// Binaries that must be on PATH for this toolchain to work.
    pub toolchain: Vec<&'static str>,
}

impl fmt::Debug for LanguageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageConfig")
            .field("language", &self.language)
            .field("source_file", &self.source_file)
            .field("compile_command", &self.compile_command)
            .field("toolchain", &self.toolchain)
            .finish_non_exhaustive()
    }
}

impl LanguageConfig {
    pub fn needs_compile(&self) -> bool {
        self.compile_command.is_some()
    }

    pub fn compile_command_for(&self, source: &Path) -> Option<String> {
        self.compile_command
            .as_deref()
            .map(|template| expand_template(template, source))
    }

    pub fn run_command_for(&self, source: &Path) -> String {
        (self.run_command)(source)
    }
}

/// Quote a path for `sh -c`.
pub fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

fn expand_template(template: &str, source: &Path) -> String {
    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    template
        .replace("{source}", &shell_quote(source))
        .replace("{dir}", &shell_quote(dir))
}

fn run_node(source: &Path) -> String {
    format!("node {}", shell_quote(source))
}

fn run_python(source: &Path) -> String {
    format!("python3 {}", shell_quote(source))
}

fn run_java(source: &Path) -> String {
    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    let class = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Main".to_string());
    format!("java -cp {} {}", shell_quote(dir), class)
}

fn run_native(source: &Path) -> String {
    // `'<source>'.out` is the artifact the gcc/g++ templates produce
    format!("{}.out", shell_quote(source))
}

/// Immutable map from language to toolchain. Built once and handed to the
/// executor; tests build their own with fake toolchains.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    configs: BTreeMap<Language, LanguageConfig>,
}

impl LanguageRegistry {
    pub fn empty() -> Self {
        Self {
            configs: BTreeMap::new(),
        }
    }

    pub fn with_config(mut self, config: LanguageConfig) -> Self {
        self.configs.insert(config.language, config);
        self
    }

    pub fn resolve(&self, language: &str) -> GraderResult<&LanguageConfig> {
        let id: Language = language.parse()?;
        self.configs
            .get(&id)
            .ok_or_else(|| GraderError::UnsupportedLanguage(language.to_string()))
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.configs.keys().copied()
    }

    /// Languages whose toolchain is incomplete on this host, with the
    /// binaries that could not be found.
    pub fn missing_toolchains(&self) -> Vec<(Language, Vec<&'static str>)> {
        self.configs
            .values()
            .filter_map(|config| {
                let missing: Vec<_> = config
                    .toolchain
                    .iter()
                    .copied()
                    .filter(|bin| which::which(bin).is_err())
                    .collect();
                (!missing.is_empty()).then_some((config.language, missing))
            })
            .collect()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::empty()
            .with_config(LanguageConfig {
                language: Language::Javascript,
                file_extension: "js".into(),
                source_file: "main.js".into(),
                compile_command: None,
                run_command: run_node,
                toolchain: vec!["node"],
            })
            .with_config(LanguageConfig {
                language: Language::Python,
                file_extension: "py".into(),
                source_file: "main.py".into(),
                compile_command: None,
                run_command: run_python,
                toolchain: vec!["python3"],
            })
            .with_config(LanguageConfig {
                language: Language::Java,
                file_extension: "java".into(),
                // javac insists on the public class matching the file name
                source_file: "Main.java".into(),
                compile_command: Some("javac {source}".into()),
                run_command: run_java,
                toolchain: vec!["javac", "java"],
            })
            .with_config(LanguageConfig {
                language: Language::C,
                file_extension: "c".into(),
                source_file: "main.c".into(),
                compile_command: Some("gcc {source} -o {source}.out".into()),
                run_command: run_native,
                toolchain: vec!["gcc"],
            })
            .with_config(LanguageConfig {
                language: Language::Cpp,
                file_extension: "cpp".into(),
                source_file: "main.cpp".into(),
                compile_command: Some("g++ {source} -o {source}.out".into()),
                run_command: run_native,
                toolchain: vec!["g++"],
            })
    }
}
