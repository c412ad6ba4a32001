//! Header search paths and include resolution

use log::debug;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::file_manager::{FileEntry, FileManager};
use crate::lang_options::LangOptions;

/// Group a search directory belongs to
///
/// The search list holds every `System` directory before any `ExternCSystem`
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IncludeDirGroup {
    /// System directory (`-isystem`)
    System,
    /// System directory whose headers get implicit `extern "C"` in C++
    ExternCSystem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSearchEntry {
    pub path: PathBuf,
    pub group: IncludeDirGroup,
}

/// Configuration of the header search list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSearchOptions {
    pub resource_dir: PathBuf,
    /// Add `<resource_dir>/include`
    pub use_builtin_includes: bool,
    /// Add the host's standard system include directories
    pub use_standard_system_includes: bool,
    /// Add the host's standard C++ library include directory
    pub use_standard_cxx_includes: bool,
    pub entries: Vec<HeaderSearchEntry>,
}

impl Default for HeaderSearchOptions {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::new(),
            use_builtin_includes: true,
            use_standard_system_includes: true,
            use_standard_cxx_includes: true,
            entries: Vec::new(),
        }
    }
}

impl HeaderSearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>, group: IncludeDirGroup) {
        self.entries.push(HeaderSearchEntry {
            path: path.into(),
            group,
        });
    }
}

/// Where an include was found
#[derive(Debug, Clone)]
pub struct IncludeLookup {
    pub file: Arc<FileEntry>,
    /// `None` when found relative to the including file
    pub group: Option<IncludeDirGroup>,
}

/// Realised header search list
#[derive(Debug, Default)]
pub struct HeaderSearch {
    search_dirs: Vec<HeaderSearchEntry>,
}

impl HeaderSearch {
    /// Realise `options` into a search list
    ///
    /// Directories are ordered by group, keeping configuration order within a
    /// group with injected host directories last. Later duplicates and
    /// directories that do not exist are dropped.
    pub fn new(options: &HeaderSearchOptions, lang_opts: &LangOptions, fm: &mut FileManager) -> Self {
        let mut candidates = options.entries.clone();

        if options.use_builtin_includes && !options.resource_dir.as_os_str().is_empty() {
            candidates.push(HeaderSearchEntry {
                path: options.resource_dir.join("include"),
                group: IncludeDirGroup::System,
            });
        }
        if options.use_standard_cxx_includes && lang_opts.cplusplus {
            candidates.push(HeaderSearchEntry {
                path: PathBuf::from("/usr/include/c++"),
                group: IncludeDirGroup::System,
            });
        }
        if options.use_standard_system_includes {
            for dir in ["/usr/local/include", "/usr/include"] {
                candidates.push(HeaderSearchEntry {
                    path: PathBuf::from(dir),
                    group: IncludeDirGroup::ExternCSystem,
                });
            }
        }

        candidates.sort_by_key(|entry| entry.group);

        let mut seen = HashSet::new();
        let mut search_dirs = Vec::new();
        for entry in candidates {
            if !seen.insert(entry.path.clone()) {
                debug!("Ignoring duplicate include directory {}", entry.path.display());
            } else if !fm.directory_exists(&entry.path) {
                debug!("Ignoring nonexistent include directory {}", entry.path.display());
            } else {
                search_dirs.push(entry);
            }
        }

        Self { search_dirs }
    }

    pub fn search_dirs(&self) -> &[HeaderSearchEntry] {
        &self.search_dirs
    }

    /// Resolve an include name
    ///
    /// Quoted includes look in `includer_dir` first, then every include walks
    /// the search list in order.
    pub fn lookup_file(
        &self,
        name: &str,
        is_angled: bool,
        includer_dir: Option<&Path>,
        fm: &mut FileManager,
    ) -> Option<IncludeLookup> {
        let requested = Path::new(name);
        if requested.is_absolute() {
            return fm.get_file(requested).map(|file| IncludeLookup { file, group: None });
        }

        if !is_angled {
            if let Some(file) = includer_dir.and_then(|dir| fm.get_file(&dir.join(requested))) {
                return Some(IncludeLookup { file, group: None });
            }
        }

        self.search_dirs.iter().find_map(|entry| {
            fm.get_file(&entry.path.join(requested))
                .map(|file| IncludeLookup {
                    file,
                    group: Some(entry.group),
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn no_injection() -> HeaderSearchOptions {
        HeaderSearchOptions {
            use_builtin_includes: false,
            use_standard_system_includes: false,
            use_standard_cxx_includes: false,
            ..HeaderSearchOptions::new()
        }
    }

    #[test]
    fn test_search_list_order_and_filtering() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        let mut options = no_injection();
        options.add_path(first.path(), IncludeDirGroup::System);
        options.add_path(first.path().join("missing"), IncludeDirGroup::System);
        options.add_path(second.path(), IncludeDirGroup::ExternCSystem);
        options.add_path(first.path(), IncludeDirGroup::ExternCSystem);

        let mut fm = FileManager::new();
        let search = HeaderSearch::new(&options, &LangOptions::new(), &mut fm);

        assert_eq!(
            search.search_dirs(),
            &[
                HeaderSearchEntry {
                    path: first.path().to_path_buf(),
                    group: IncludeDirGroup::System
                },
                HeaderSearchEntry {
                    path: second.path().to_path_buf(),
                    group: IncludeDirGroup::ExternCSystem
                },
            ]
        );
    }

    #[test]
    fn test_system_group_precedes_extern_c() {
        let externc = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        fs::write(externc.path().join("h.h"), "int externc;\n").unwrap();
        fs::write(extra.path().join("h.h"), "int extra;\n").unwrap();

        let mut options = no_injection();
        options.add_path(externc.path(), IncludeDirGroup::ExternCSystem);
        options.add_path(extra.path(), IncludeDirGroup::System);
        options.add_path(externc.path(), IncludeDirGroup::System);
        let mut fm = FileManager::new();
        let search = HeaderSearch::new(&options, &LangOptions::new(), &mut fm);

        let groups: Vec<_> = search
            .search_dirs()
            .iter()
            .map(|entry| (entry.path.clone(), entry.group))
            .collect();
        assert_eq!(
            groups,
            [
                (extra.path().to_path_buf(), IncludeDirGroup::System),
                (externc.path().to_path_buf(), IncludeDirGroup::System),
            ]
        );

        let found = search.lookup_file("h.h", true, None, &mut fm).unwrap();
        assert_eq!(found.file.contents(), "int extra;\n");
        assert_eq!(found.group, Some(IncludeDirGroup::System));
    }

    #[test]
    fn test_lookup_prefers_includer_directory_for_quoted() {
        let local = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        fs::write(local.path().join("a.h"), "int local;\n").unwrap();
        fs::write(system.path().join("a.h"), "int system;\n").unwrap();

        let mut options = no_injection();
        options.add_path(system.path(), IncludeDirGroup::ExternCSystem);
        let mut fm = FileManager::new();
        let search = HeaderSearch::new(&options, &LangOptions::new(), &mut fm);

        let quoted = search
            .lookup_file("a.h", false, Some(local.path()), &mut fm)
            .unwrap();
        assert_eq!(quoted.file.contents(), "int local;\n");
        assert_eq!(quoted.group, None);

        let angled = search
            .lookup_file("a.h", true, Some(local.path()), &mut fm)
            .unwrap();
        assert_eq!(angled.file.contents(), "int system;\n");
        assert_eq!(angled.group, Some(IncludeDirGroup::ExternCSystem));

        assert!(search.lookup_file("b.h", true, None, &mut fm).is_none());
    }

    #[test]
    fn test_injected_resource_include() {
        let resource = tempfile::tempdir().unwrap();
        fs::create_dir(resource.path().join("include")).unwrap();

        let options = HeaderSearchOptions {
            resource_dir: resource.path().to_path_buf(),
            use_standard_system_includes: false,
            use_standard_cxx_includes: false,
            ..HeaderSearchOptions::new()
        };
        let mut fm = FileManager::new();
        let search = HeaderSearch::new(&options, &LangOptions::new(), &mut fm);

        assert_eq!(search.search_dirs().len(), 1);
        assert_eq!(search.search_dirs()[0].path, resource.path().join("include"));
    }
}
