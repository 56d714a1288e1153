use std::fmt;

use goblin::elf::sym::{
    Sym, STB_GLOBAL, STB_LOCAL, STB_WEAK, STT_FUNC, STT_NOTYPE, STT_OBJECT, STT_SECTION,
    STT_TLS, STV_HIDDEN, STV_INTERNAL, STV_PROTECTED,
};

/// Type of a symbol (`STT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// `STT_NOTYPE`
    NoType,
    /// `STT_OBJECT`, a data object such as the `application_config` struct
    Object,
    /// `STT_FUNC`
    Function,
    /// `STT_SECTION`
    Section,
    /// `STT_TLS`
    Tls,
    /// Any other value
    Other(u8),
}

impl From<u8> for SymbolKind {
    fn from(value: u8) -> Self {
        match value {
            STT_NOTYPE => SymbolKind::NoType,
            STT_OBJECT => SymbolKind::Object,
            STT_FUNC => SymbolKind::Function,
            STT_SECTION => SymbolKind::Section,
            STT_TLS => SymbolKind::Tls,
            other => SymbolKind::Other(other),
        }
    }
}

/// Binding of a symbol (`STB_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolBinding {
    /// `STB_LOCAL`
    Local,
    /// `STB_GLOBAL`
    Global,
    /// `STB_WEAK`
    Weak,
    /// Any other value
    Other(u8),
}

impl From<u8> for SymbolBinding {
    fn from(value: u8) -> Self {
        match value {
            STB_LOCAL => SymbolBinding::Local,
            STB_GLOBAL => SymbolBinding::Global,
            STB_WEAK => SymbolBinding::Weak,
            other => SymbolBinding::Other(other),
        }
    }
}

/// Visibility of a symbol (`STV_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolVisibility {
    /// `STV_DEFAULT`
    Default,
    /// `STV_INTERNAL`
    Internal,
    /// `STV_HIDDEN`
    Hidden,
    /// `STV_PROTECTED`
    Protected,
}

impl From<u8> for SymbolVisibility {
    fn from(value: u8) -> Self {
        match value & 0x3 {
            STV_INTERNAL => SymbolVisibility::Internal,
            STV_HIDDEN => SymbolVisibility::Hidden,
            STV_PROTECTED => SymbolVisibility::Protected,
            _ => SymbolVisibility::Default,
        }
    }
}

/// A defined symbol of an [`crate::elf::ElfImage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfSymbol {
    /// Symbol name
    pub name: String,
    /// Virtual address (`st_value`)
    pub address: u64,
    /// Size in bytes (`st_size`)
    pub size: u64,
    /// Symbol type
    pub kind: SymbolKind,
    /// Symbol binding
    pub binding: SymbolBinding,
    /// Symbol visibility
    pub visibility: SymbolVisibility,
    /// Index of the section holding the symbol
    pub section: usize,
}

impl ElfSymbol {
    pub(crate) fn from_sym(name: &str, sym: &Sym) -> Self {
        ElfSymbol {
            name: name.to_string(),
            address: sym.st_value,
            size: sym.st_size,
            kind: SymbolKind::from(sym.st_type()),
            binding: SymbolBinding::from(sym.st_bind()),
            visibility: SymbolVisibility::from(sym.st_visibility()),
            section: sym.st_shndx,
        }
    }
}

impl fmt::Display for ElfSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ 0x{:x} ({} bytes)", self.name, self.address, self.size)
    }
}
