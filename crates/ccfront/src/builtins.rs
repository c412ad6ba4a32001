//! Builtin identifier recognition
//!
//! Compiler builtins (`__builtin_*`) are usable without any declaration.
//! Library builtins (`printf`, `malloc`, ...) are known functions whose
//! implicit use is diagnosed with a hint naming the header that declares them.

use std::collections::HashMap;

use crate::lang_options::LangOptions;

/// Category of a builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    /// Provided by the compiler itself
    Compiler,
    /// Standard library function declared in `header`
    Library { header: &'static str },
}

/// Languages a builtin is available in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltinLangs {
    All,
    /// Only with GNU extensions enabled
    Gnu,
    /// Only in C++
    Cxx,
}

/// A recognised builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinRecord {
    pub name: &'static str,
    pub kind: BuiltinKind,
}

const BUILTINS: &[(&str, BuiltinLangs, BuiltinKind)] = &[
    // Compiler builtins
    ("__builtin_expect", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_unreachable", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_trap", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_offsetof", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_va_start", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_va_end", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_va_arg", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_va_copy", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_memcpy", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_memset", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_strlen", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_constant_p", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_clz", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_ctz", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_popcount", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_bswap32", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_bswap64", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_alloca", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_abort", BuiltinLangs::All, BuiltinKind::Compiler),
    ("__builtin_types_compatible_p", BuiltinLangs::Gnu, BuiltinKind::Compiler),
    ("__builtin_choose_expr", BuiltinLangs::Gnu, BuiltinKind::Compiler),
    ("__builtin_addressof", BuiltinLangs::Cxx, BuiltinKind::Compiler),
    // Library builtins
    ("printf", BuiltinLangs::All, BuiltinKind::Library { header: "stdio.h" }),
    ("fprintf", BuiltinLangs::All, BuiltinKind::Library { header: "stdio.h" }),
    ("sprintf", BuiltinLangs::All, BuiltinKind::Library { header: "stdio.h" }),
    ("snprintf", BuiltinLangs::All, BuiltinKind::Library { header: "stdio.h" }),
    ("scanf", BuiltinLangs::All, BuiltinKind::Library { header: "stdio.h" }),
    ("puts", BuiltinLangs::All, BuiltinKind::Library { header: "stdio.h" }),
    ("putchar", BuiltinLangs::All, BuiltinKind::Library { header: "stdio.h" }),
    ("malloc", BuiltinLangs::All, BuiltinKind::Library { header: "stdlib.h" }),
    ("calloc", BuiltinLangs::All, BuiltinKind::Library { header: "stdlib.h" }),
    ("realloc", BuiltinLangs::All, BuiltinKind::Library { header: "stdlib.h" }),
    ("free", BuiltinLangs::All, BuiltinKind::Library { header: "stdlib.h" }),
    ("abort", BuiltinLangs::All, BuiltinKind::Library { header: "stdlib.h" }),
    ("exit", BuiltinLangs::All, BuiltinKind::Library { header: "stdlib.h" }),
    ("abs", BuiltinLangs::All, BuiltinKind::Library { header: "stdlib.h" }),
    ("memcpy", BuiltinLangs::All, BuiltinKind::Library { header: "string.h" }),
    ("memset", BuiltinLangs::All, BuiltinKind::Library { header: "string.h" }),
    ("memcmp", BuiltinLangs::All, BuiltinKind::Library { header: "string.h" }),
    ("strlen", BuiltinLangs::All, BuiltinKind::Library { header: "string.h" }),
    ("strcmp", BuiltinLangs::All, BuiltinKind::Library { header: "string.h" }),
    ("strcpy", BuiltinLangs::All, BuiltinKind::Library { header: "string.h" }),
    ("sqrt", BuiltinLangs::All, BuiltinKind::Library { header: "math.h" }),
    ("pow", BuiltinLangs::All, BuiltinKind::Library { header: "math.h" }),
    ("alloca", BuiltinLangs::Gnu, BuiltinKind::Library { header: "alloca.h" }),
    ("bzero", BuiltinLangs::Gnu, BuiltinKind::Library { header: "strings.h" }),
    ("index", BuiltinLangs::Gnu, BuiltinKind::Library { header: "strings.h" }),
];

/// Table of builtins enabled for the current dialect
#[derive(Debug, Default)]
pub struct BuiltinInfo {
    records: HashMap<&'static str, BuiltinRecord>,
}

impl BuiltinInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the builtins available under `lang_opts`
    pub fn initialize_builtins(&mut self, lang_opts: &LangOptions) {
        self.records.clear();

        for (name, langs, kind) in BUILTINS {
            let enabled = match langs {
                BuiltinLangs::All => true,
                BuiltinLangs::Gnu => lang_opts.gnu_mode,
                BuiltinLangs::Cxx => lang_opts.cplusplus,
            };
            if enabled {
                self.records.insert(name, BuiltinRecord { name, kind: *kind });
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&BuiltinRecord> {
        self.records.get(name)
    }

    /// Whether `name` is a compiler builtin usable without declaration
    pub fn is_compiler_builtin(&self, name: &str) -> bool {
        matches!(
            self.lookup(name),
            Some(BuiltinRecord {
                kind: BuiltinKind::Compiler,
                ..
            })
        )
    }

    /// Header declaring library builtin `name`
    pub fn library_header(&self, name: &str) -> Option<&'static str> {
        match self.lookup(name)?.kind {
            BuiltinKind::Library { header } => Some(header),
            BuiltinKind::Compiler => None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninitialized_table_is_empty() {
        let info = BuiltinInfo::new();
        assert!(info.is_empty());
        assert!(info.lookup("printf").is_none());
    }

    #[test]
    fn test_strict_c_builtins() {
        let mut info = BuiltinInfo::new();
        info.initialize_builtins(&LangOptions::new());

        assert!(info.is_compiler_builtin("__builtin_expect"));
        assert!(!info.is_compiler_builtin("printf"));
        assert_eq!(info.library_header("printf"), Some("stdio.h"));
        assert!(info.lookup("alloca").is_none());
        assert!(info.lookup("__builtin_addressof").is_none());
    }

    #[test]
    fn test_gnu_and_cxx_builtins() {
        let opts = LangOptions {
            gnu_mode: true,
            cplusplus: true,
            ..LangOptions::new()
        };
        let mut info = BuiltinInfo::new();
        info.initialize_builtins(&opts);

        assert_eq!(info.library_header("alloca"), Some("alloca.h"));
        assert!(info.is_compiler_builtin("__builtin_types_compatible_p"));
        assert!(info.is_compiler_builtin("__builtin_addressof"));
    }
}
