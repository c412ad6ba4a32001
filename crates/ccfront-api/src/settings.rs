use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Source language of the translation unit
///
/// Profiles describe whole toolchains, so they may carry search paths for the
/// Objective-C dialects as well. Only C and C++ can be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "c")]
    C,
    #[serde(rename = "c++")]
    Cxx,
    #[serde(rename = "objective-c")]
    ObjC,
    #[serde(rename = "objective-c++")]
    ObjCxx,
}

impl Language {
    /// Name as used on a compiler command line (`-x <name>`)
    pub fn name(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
            Language::ObjC => "objective-c",
            Language::ObjCxx => "objective-c++",
        }
    }

    /// Whether the front end can parse this language
    pub fn is_supported(&self) -> bool {
        matches!(self, Language::C | Language::Cxx)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Include-path profile describing a target toolchain environment
///
/// Paths in the `internal_*` maps are relative to `root_path`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Directory the relative profile paths are resolved against
    pub root_path: PathBuf,

    /// Compiler resource directory
    pub resource_dir: PathBuf,

    /// System include directories, per language, in search order
    #[serde(default)]
    pub internal_isystem: HashMap<Language, Vec<PathBuf>>,

    /// System include directories whose headers get C linkage, per language
    #[serde(default)]
    pub internal_externc_isystem: HashMap<Language, Vec<PathBuf>>,
}

impl Profile {
    pub fn new(root_path: impl Into<PathBuf>, resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            resource_dir: resource_dir.into(),
            ..Default::default()
        }
    }

    /// Append a system include directory for `language`
    pub fn with_isystem(mut self, language: Language, path: impl Into<PathBuf>) -> Self {
        self.internal_isystem
            .entry(language)
            .or_default()
            .push(path.into());
        self
    }

    /// Append an extern-C system include directory for `language`
    pub fn with_externc_isystem(mut self, language: Language, path: impl Into<PathBuf>) -> Self {
        self.internal_externc_isystem
            .entry(language)
            .or_default()
            .push(path.into());
        self
    }

    /// Resolved system include directories for `language`, in configured order
    pub fn system_paths(&self, language: Language) -> Vec<PathBuf> {
        resolve_all(&self.root_path, self.internal_isystem.get(&language))
    }

    /// Resolved extern-C system include directories for `language`
    pub fn externc_system_paths(&self, language: Language) -> Vec<PathBuf> {
        resolve_all(&self.root_path, self.internal_externc_isystem.get(&language))
    }
}

fn resolve_all(root: &Path, paths: Option<&Vec<PathBuf>>) -> Vec<PathBuf> {
    paths
        .map(|list| list.iter().map(|path| root.join(path)).collect())
        .unwrap_or_default()
}

/// Settings for a compiler instance
///
/// Immutable once handed to a compiler instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Source language
    pub language: Language,

    /// Standard version code (C: 89, 94, 99, 11; C++: 98, 11, 14)
    pub language_standard: u32,

    /// Enable GNU dialect extensions
    #[serde(default)]
    pub enable_gnu_extensions: bool,

    /// Include-path profile
    #[serde(default)]
    pub profile: Profile,

    /// Extra system include folders, searched after the profile directories
    #[serde(default)]
    pub additional_include_folders: Vec<PathBuf>,

    /// Target triple (None = host default)
    #[serde(default)]
    pub target_triple: Option<String>,
}

impl Settings {
    /// Create settings for `language` at `language_standard` with an empty profile
    pub fn new(language: Language, language_standard: u32) -> Self {
        Self {
            language,
            language_standard,
            enable_gnu_extensions: false,
            profile: Profile::default(),
            additional_include_folders: Vec::new(),
            target_triple: None,
        }
    }

    /// Load settings from a JSON document
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Enable or disable GNU extensions
    pub fn with_gnu_extensions(mut self, enable: bool) -> Self {
        self.enable_gnu_extensions = enable;
        self
    }

    /// Set the include-path profile
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Append an additional include folder
    pub fn with_include_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.additional_include_folders.push(path.into());
        self
    }

    /// Override the target triple
    pub fn with_target_triple(mut self, triple: impl Into<String>) -> Self {
        self.target_triple = Some(triple.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_support() {
        assert!(Language::C.is_supported());
        assert!(Language::Cxx.is_supported());
        assert!(!Language::ObjC.is_supported());
        assert!(!Language::ObjCxx.is_supported());
        assert_eq!(Language::Cxx.to_string(), "c++");
    }

    #[test]
    fn test_profile_resolves_against_root() {
        let profile = Profile::new("/opt/toolchain", "/opt/toolchain/lib/clang")
            .with_isystem(Language::C, "include")
            .with_isystem(Language::C, "usr/include")
            .with_externc_isystem(Language::Cxx, "usr/include/c");

        assert_eq!(
            profile.system_paths(Language::C),
            vec![
                PathBuf::from("/opt/toolchain/include"),
                PathBuf::from("/opt/toolchain/usr/include"),
            ]
        );
        assert!(profile.system_paths(Language::Cxx).is_empty());
        assert_eq!(
            profile.externc_system_paths(Language::Cxx),
            vec![PathBuf::from("/opt/toolchain/usr/include/c")]
        );
    }

    #[test]
    fn test_settings_builder() {
        let settings = Settings::new(Language::Cxx, 14)
            .with_gnu_extensions(true)
            .with_include_folder("include")
            .with_target_triple("x86_64-unknown-linux-gnu");

        assert_eq!(settings.language_standard, 14);
        assert!(settings.enable_gnu_extensions);
        assert_eq!(settings.additional_include_folders.len(), 1);
        assert_eq!(
            settings.target_triple.as_deref(),
            Some("x86_64-unknown-linux-gnu")
        );
    }

    #[test]
    fn test_settings_from_json() {
        let json = r#"{
            "language": "c++",
            "language_standard": 11,
            "profile": {
                "root_path": "/sdk",
                "resource_dir": "/sdk/resource",
                "internal_isystem": { "c++": ["include/c++/v1"] },
                "internal_externc_isystem": { "c++": ["usr/include"] }
            }
        }"#;

        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.language, Language::Cxx);
        assert_eq!(settings.language_standard, 11);
        assert!(!settings.enable_gnu_extensions);
        assert!(settings.additional_include_folders.is_empty());
        assert_eq!(
            settings.profile.system_paths(Language::Cxx),
            vec![PathBuf::from("/sdk/include/c++/v1")]
        );
    }

    #[test]
    fn test_settings_from_json_rejects_unknown_language() {
        let json = r#"{ "language": "fortran", "language_standard": 77 }"#;
        assert!(Settings::from_json(json).is_err());
    }
}
