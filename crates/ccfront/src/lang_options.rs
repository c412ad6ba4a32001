//! Language dialect options
//!
//! [`LangOptions`] is filled in two passes: the session first sets the dialect
//! switches it controls explicitly (C++ mode, RTTI, exceptions, GNU mode), then
//! [`LangOptions::set_lang_defaults`] derives the standard-dependent flags.

use ccfront_api::{FrontendError, FrontendResult, Language};
use target_lexicon::Triple;

use crate::target::char_is_signed;

/// Kind of input file, selecting the grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    C,
    Cxx,
}

/// Supported language standards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LangStandard {
    C89,
    C94,
    C99,
    C11,
    Cxx98,
    Cxx11,
    Cxx14,
}

impl LangStandard {
    /// Map a language and version code onto a standard
    pub fn from_version(language: Language, version: u32) -> FrontendResult<Self> {
        let standard = match (language, version) {
            (Language::C, 89) => LangStandard::C89,
            (Language::C, 94) => LangStandard::C94,
            (Language::C, 99) => LangStandard::C99,
            (Language::C, 11) => LangStandard::C11,
            (Language::Cxx, 98) => LangStandard::Cxx98,
            (Language::Cxx, 11) => LangStandard::Cxx11,
            (Language::Cxx, 14) => LangStandard::Cxx14,
            (Language::C | Language::Cxx, _) => {
                return Err(FrontendError::InvalidLanguageStandard {
                    language,
                    standard: version,
                })
            }
            _ => return Err(FrontendError::InvalidLanguage(language)),
        };
        Ok(standard)
    }

    pub fn name(&self) -> &'static str {
        match self {
            LangStandard::C89 => "c89",
            LangStandard::C94 => "iso9899:199409",
            LangStandard::C99 => "c99",
            LangStandard::C11 => "c11",
            LangStandard::Cxx98 => "c++98",
            LangStandard::Cxx11 => "c++11",
            LangStandard::Cxx14 => "c++14",
        }
    }

    pub fn input_kind(&self) -> InputKind {
        if self.is_cplusplus() {
            InputKind::Cxx
        } else {
            InputKind::C
        }
    }

    pub fn is_cplusplus(&self) -> bool {
        matches!(
            self,
            LangStandard::Cxx98 | LangStandard::Cxx11 | LangStandard::Cxx14
        )
    }

    pub fn is_c99(&self) -> bool {
        matches!(self, LangStandard::C99 | LangStandard::C11)
    }

    pub fn is_c11(&self) -> bool {
        matches!(self, LangStandard::C11)
    }

    pub fn is_cplusplus11(&self) -> bool {
        matches!(self, LangStandard::Cxx11 | LangStandard::Cxx14)
    }

    pub fn is_cplusplus14(&self) -> bool {
        matches!(self, LangStandard::Cxx14)
    }

    pub fn has_line_comments(&self) -> bool {
        self.is_c99() || self.is_cplusplus()
    }

    pub fn has_digraphs(&self) -> bool {
        !matches!(self, LangStandard::C89)
    }

    /// Version macro and its value (`__STDC_VERSION__` or `__cplusplus`)
    pub fn version_macro(&self) -> Option<(&'static str, &'static str)> {
        match self {
            LangStandard::C89 => None,
            LangStandard::C94 => Some(("__STDC_VERSION__", "199409L")),
            LangStandard::C99 => Some(("__STDC_VERSION__", "199901L")),
            LangStandard::C11 => Some(("__STDC_VERSION__", "201112L")),
            LangStandard::Cxx98 => Some(("__cplusplus", "199711L")),
            LangStandard::Cxx11 => Some(("__cplusplus", "201103L")),
            LangStandard::Cxx14 => Some(("__cplusplus", "201402L")),
        }
    }
}

/// Dialect switches of the translation unit
///
/// `cplusplus` selects the grammar, the C++ semantic checks and implicit
/// `extern "C"`; `gnu_mode` enables the GNU builtins; and
/// `implicit_function_declarations` decides how undeclared calls are
/// reported. The remaining flags are not consulted while processing; they
/// describe the dialect to callbacks through
/// [`AstContext::lang_opts`](crate::ast::AstContext::lang_opts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LangOptions {
    pub standard: Option<LangStandard>,

    // Set explicitly by the session
    pub cplusplus: bool,
    pub rtti: bool,
    pub cxx_exceptions: bool,
    pub gnu_mode: bool,
    pub gnu_keywords: bool,
    pub bool_type: bool,

    // Derived from the standard
    pub c99: bool,
    pub c11: bool,
    pub cplusplus11: bool,
    pub cplusplus14: bool,
    pub line_comment: bool,
    pub digraphs: bool,
    pub hex_floats: bool,
    pub trigraphs: bool,
    pub implicit_int: bool,
    pub implicit_function_declarations: bool,
    pub wchar: bool,
    pub char_is_signed: bool,
}

impl LangOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the standard-dependent flags
    ///
    /// The explicit dialect switches (`cplusplus`, `rtti`, `cxx_exceptions`,
    /// `gnu_mode`, `gnu_keywords`, `bool_type`) are left untouched.
    pub fn set_lang_defaults(
        &mut self,
        input_kind: InputKind,
        triple: &Triple,
        standard: LangStandard,
    ) {
        debug_assert_eq!(input_kind, standard.input_kind());

        self.standard = Some(standard);
        self.c99 = standard.is_c99();
        self.c11 = standard.is_c11();
        self.cplusplus11 = standard.is_cplusplus11();
        self.cplusplus14 = standard.is_cplusplus14();
        self.line_comment = standard.has_line_comments();
        self.digraphs = standard.has_digraphs();
        self.hex_floats = self.c99 || self.cplusplus14 || self.gnu_mode;
        self.trigraphs = !self.gnu_mode;

        let is_c = input_kind == InputKind::C;
        self.implicit_int = is_c && !self.c99;
        self.implicit_function_declarations = is_c && !self.c99;
        self.wchar = input_kind == InputKind::Cxx;
        self.char_is_signed = char_is_signed(triple);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn linux_x86_64() -> Triple {
        Triple::from_str("x86_64-unknown-linux-gnu").unwrap()
    }

    #[test]
    fn test_standard_table() {
        assert_eq!(
            LangStandard::from_version(Language::C, 89).unwrap(),
            LangStandard::C89
        );
        assert_eq!(
            LangStandard::from_version(Language::C, 11).unwrap(),
            LangStandard::C11
        );
        assert_eq!(
            LangStandard::from_version(Language::Cxx, 11).unwrap(),
            LangStandard::Cxx11
        );
        assert_eq!(
            LangStandard::from_version(Language::Cxx, 14).unwrap(),
            LangStandard::Cxx14
        );
    }

    #[test]
    fn test_unmapped_standard_is_rejected() {
        for (language, version) in [
            (Language::C, 17),
            (Language::C, 98),
            (Language::Cxx, 17),
            (Language::Cxx, 99),
        ] {
            match LangStandard::from_version(language, version) {
                Err(FrontendError::InvalidLanguageStandard { standard, .. }) => {
                    assert_eq!(standard, version)
                }
                other => panic!("Expected InvalidLanguageStandard, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unsupported_language_is_rejected() {
        assert!(matches!(
            LangStandard::from_version(Language::ObjC, 99),
            Err(FrontendError::InvalidLanguage(Language::ObjC))
        ));
    }

    #[test]
    fn test_c89_defaults() {
        let mut opts = LangOptions::new();
        opts.set_lang_defaults(InputKind::C, &linux_x86_64(), LangStandard::C89);

        assert!(!opts.c99);
        assert!(!opts.line_comment);
        assert!(!opts.digraphs);
        assert!(opts.implicit_function_declarations);
        assert!(opts.trigraphs);
        assert!(opts.char_is_signed);
    }

    #[test]
    fn test_defaults_keep_explicit_switches() {
        let mut opts = LangOptions::new();
        opts.cplusplus = true;
        opts.rtti = true;
        opts.gnu_mode = true;
        opts.bool_type = true;
        opts.set_lang_defaults(InputKind::Cxx, &linux_x86_64(), LangStandard::Cxx98);

        assert!(opts.cplusplus);
        assert!(opts.rtti);
        assert!(opts.gnu_mode);
        assert!(opts.bool_type);
        assert!(!opts.cplusplus11);
        assert!(opts.line_comment);
        assert!(opts.hex_floats);
        assert!(!opts.trigraphs);
        assert!(!opts.implicit_function_declarations);
    }
}
