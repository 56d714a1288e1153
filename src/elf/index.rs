use std::collections::HashMap;

use goblin::elf::{
    header::{EM_386, EM_AARCH64, EM_ARM, EM_X86_64},
    reloc::RelocSection,
    section_header::{SHF_ALLOC, SHF_WRITE, SHT_NOBITS, SHT_PROGBITS},
    Elf,
};
use rangemap::RangeMap;

use super::ElfSymbol;

const R_AARCH64_RELATIVE: u32 = 1027;
const R_X86_64_RELATIVE: u32 = 8;
const R_ARM_RELATIVE: u32 = 23;
const R_386_RELATIVE: u32 = 8;

/// A section header reduced to what address resolution needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    /// Section name from `.shstrtab`
    pub name: String,
    /// Virtual address of the first byte
    pub address: u64,
    /// Size in bytes
    pub size: u64,
    /// File offset of the first byte
    pub offset: u64,
    /// `SHF_WRITE` is set
    pub writable: bool,
    /// `SHT_PROGBITS`
    pub progbits: bool,
    /// `SHT_NOBITS`, no file data backs the section
    pub nobits: bool,
}

impl SectionInfo {
    /// File offset of `address`, or `None` when the address is outside this section or the
    /// section has no file data.
    pub fn file_offset(&self, address: u64) -> Option<u64> {
        if self.nobits || address < self.address || address >= self.address + self.size {
            return None;
        }
        Some(self.offset + (address - self.address))
    }
}

/// A dynamic relocation that patches a pointer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotRelocation {
    pub r_type: u32,
    pub addend: Option<i64>,
    pub relative: bool,
}

/// Owned lookup tables built once from the parsed image.
pub(crate) struct ElfIndex {
    pub is_64bit: bool,
    pub machine: u16,
    pub symbols: HashMap<String, ElfSymbol>,
    pub sections: Vec<SectionInfo>,
    pub ranges: RangeMap<u64, usize>,
    pub relocations: HashMap<u64, SlotRelocation>,
}

impl ElfIndex {
    pub fn build(elf: &Elf) -> Self {
        let machine = elf.header.e_machine;

        let sections: Vec<SectionInfo> = elf
            .section_headers
            .iter()
            .map(|header| SectionInfo {
                name: elf
                    .shdr_strtab
                    .get_at(header.sh_name)
                    .unwrap_or_default()
                    .to_string(),
                address: header.sh_addr,
                size: header.sh_size,
                offset: header.sh_offset,
                writable: header.sh_flags & u64::from(SHF_WRITE) != 0,
                progbits: header.sh_type == SHT_PROGBITS,
                nobits: header.sh_type == SHT_NOBITS,
            })
            .collect();

        let mut ranges = RangeMap::new();
        for (index, header) in elf.section_headers.iter().enumerate() {
            if header.sh_flags & u64::from(SHF_ALLOC) == 0 || header.sh_size == 0 {
                continue;
            }
            let Some(end) = header.sh_addr.checked_add(header.sh_size) else {
                log::warn!("Section {index} wraps the address space, ignoring it");
                continue;
            };
            ranges.insert(header.sh_addr..end, index);
        }

        // .symtab wins over .dynsym for names present in both
        let mut symbols = HashMap::new();
        for (table, strings) in [(&elf.syms, &elf.strtab), (&elf.dynsyms, &elf.dynstrtab)] {
            for sym in table.iter() {
                if sym.st_shndx == 0 {
                    continue;
                }
                let Some(name) = strings.get_at(sym.st_name) else {
                    continue;
                };
                if name.is_empty() || symbols.contains_key(name) {
                    continue;
                }
                symbols.insert(name.to_string(), ElfSymbol::from_sym(name, &sym));
            }
        }

        let relative_type = match machine {
            EM_AARCH64 => Some(R_AARCH64_RELATIVE),
            EM_X86_64 => Some(R_X86_64_RELATIVE),
            EM_ARM => Some(R_ARM_RELATIVE),
            EM_386 => Some(R_386_RELATIVE),
            _ => None,
        };

        let mut relocations = HashMap::new();
        let mut collect = |section: &RelocSection| {
            for reloc in section.iter() {
                relocations.insert(
                    reloc.r_offset,
                    SlotRelocation {
                        r_type: reloc.r_type,
                        addend: reloc.r_addend,
                        relative: Some(reloc.r_type) == relative_type,
                    },
                );
            }
        };
        collect(&elf.dynrelas);
        collect(&elf.dynrels);
        for (_, section) in &elf.shdr_relocs {
            collect(section);
        }

        ElfIndex {
            is_64bit: elf.is_64,
            machine,
            symbols,
            sections,
            ranges,
            relocations,
        }
    }

    /// The section whose address range contains `address`.
    pub fn section_for(&self, address: u64) -> Option<&SectionInfo> {
        self.ranges
            .get(&address)
            .and_then(|index| self.sections.get(*index))
    }
}
