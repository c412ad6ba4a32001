//! Target description
//!
//! Target properties the front end needs (type widths, char signedness,
//! architecture macros), derived from a [`target_lexicon::Triple`].

use ccfront_api::{FrontendError, FrontendResult};
use log::debug;
use std::str::FromStr;
use target_lexicon::{Architecture, Endianness, OperatingSystem, PointerWidth, Triple, Vendor};

/// Triple of the machine the front end runs on
pub fn default_target_triple() -> String {
    Triple::host().to_string()
}

/// Whether plain `char` is signed on `triple`
pub fn char_is_signed(triple: &Triple) -> bool {
    let unsigned_arch = matches!(
        triple.architecture,
        Architecture::Arm(_)
            | Architecture::Aarch64(_)
            | Architecture::Powerpc
            | Architecture::Powerpc64
            | Architecture::Powerpc64le
            | Architecture::Riscv32(_)
            | Architecture::Riscv64(_)
            | Architecture::S390x
    );

    // Apple and Windows keep char signed on ARM
    let signed_abi =
        triple.vendor == Vendor::Apple || triple.operating_system == OperatingSystem::Windows;

    !unsigned_arch || signed_abi
}

/// Options used to build [`TargetInfo`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOptions {
    pub triple: String,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            triple: default_target_triple(),
        }
    }
}

/// Properties of the compilation target
#[derive(Debug, Clone, PartialEq)]
pub struct TargetInfo {
    triple: Triple,
    pointer_width: u8,
    long_width: u8,
    endianness: Endianness,
    char_is_signed: bool,
}

impl TargetInfo {
    /// Build target information for `options.triple`
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::UnknownTarget`] if the triple does not parse or
    /// names an architecture with unknown data layout.
    pub fn create(options: &TargetOptions) -> FrontendResult<Self> {
        let unknown = || FrontendError::UnknownTarget(options.triple.clone());

        let triple = Triple::from_str(&options.triple).map_err(|e| {
            debug!("Failed to parse target triple '{}': {e}", options.triple);
            unknown()
        })?;

        if triple.architecture == Architecture::Unknown {
            return Err(unknown());
        }

        let pointer_width = triple.pointer_width().map_err(|_| unknown())?;
        let endianness = triple.endianness().map_err(|_| unknown())?;

        // LLP64 on Windows, LP64/ILP32 everywhere else
        let long_width = match pointer_width {
            PointerWidth::U64 if triple.operating_system == OperatingSystem::Windows => 32,
            other => other.bits().max(32),
        };

        Ok(Self {
            char_is_signed: char_is_signed(&triple),
            pointer_width: pointer_width.bits(),
            long_width,
            endianness,
            triple,
        })
    }

    pub fn triple(&self) -> &Triple {
        &self.triple
    }

    /// Pointer width in bits
    pub fn pointer_width(&self) -> u8 {
        self.pointer_width
    }

    /// Width of `long` in bits
    pub fn long_width(&self) -> u8 {
        self.long_width
    }

    pub fn is_big_endian(&self) -> bool {
        self.endianness == Endianness::Big
    }

    pub fn char_is_signed(&self) -> bool {
        self.char_is_signed
    }

    /// Architecture macro predefined by compilers for this target
    pub fn arch_macro(&self) -> Option<&'static str> {
        match self.triple.architecture {
            Architecture::X86_64 => Some("__x86_64__"),
            Architecture::X86_32(_) => Some("__i386__"),
            Architecture::Aarch64(_) => Some("__aarch64__"),
            Architecture::Arm(_) => Some("__arm__"),
            Architecture::Riscv32(_) | Architecture::Riscv64(_) => Some("__riscv"),
            Architecture::Powerpc => Some("__powerpc__"),
            Architecture::Powerpc64 | Architecture::Powerpc64le => Some("__powerpc64__"),
            Architecture::S390x => Some("__s390x__"),
            Architecture::Wasm32 => Some("__wasm32__"),
            _ => None,
        }
    }
}
