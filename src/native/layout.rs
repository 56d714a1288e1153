//! ABI-aware layout of native structs.
//!
//! `libxamarin-app.so` exports plain C structs whose layout depends on the target word size.
//! This module reproduces the compiler's placement rules so fields can be read at the exact
//! offsets the native code uses:
//!
//! - every field is aligned to its own size;
//! - pointer-sized fields (raw pointers and `const char*` strings) are 4 bytes on 32-bit
//!   targets and 8 bytes on 64-bit targets;
//! - `bool` and `uint8_t` occupy a single byte;
//! - the struct size is rounded up to its largest field alignment, which gives the stride
//!   of array rows.
//!
//! # Examples
//!
//! ```rust
//! use apkscope::native::layout::{FieldKind, StructLayout};
//!
//! // struct { uint32_t token; MonoClass *klass; }
//! const LAYOUT: StructLayout = StructLayout::new(&[FieldKind::U32, FieldKind::Pointer]);
//! assert_eq!(LAYOUT.size(true), 16);
//! assert_eq!(LAYOUT.size(false), 8);
//! ```

use strum::{EnumCount, EnumIter};

use crate::{file::io::read_le, Error, Result};

/// Kinds of fields found in the native structs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount)]
pub enum FieldKind {
    /// C++ `bool`, one byte
    Bool,
    /// `uint8_t`
    U8,
    /// `uint32_t` (also used for 32-bit enums)
    U32,
    /// `int32_t`
    I32,
    /// `uint64_t`
    U64,
    /// Any pointer that is not dereferenced as a string
    Pointer,
    /// `const char*` resolved through the ELF image
    String,
}

impl FieldKind {
    /// Size in bytes of this field for the given word size.
    #[must_use]
    pub const fn size(self, is_64bit: bool) -> usize {
        match self {
            FieldKind::Bool | FieldKind::U8 => 1,
            FieldKind::U32 | FieldKind::I32 => 4,
            FieldKind::U64 => 8,
            FieldKind::Pointer | FieldKind::String => pointer_size(is_64bit),
        }
    }

    /// Natural alignment of this field, equal to its size.
    #[must_use]
    pub const fn alignment(self, is_64bit: bool) -> usize {
        self.size(is_64bit)
    }
}

/// Width of a pointer on the target.
#[must_use]
pub const fn pointer_size(is_64bit: bool) -> usize {
    if is_64bit {
        8
    } else {
        4
    }
}

/// Padding to insert before a field of `kind` when `size_so_far` bytes precede it.
#[must_use]
pub const fn padding(kind: FieldKind, size_so_far: usize, is_64bit: bool) -> usize {
    let alignment = kind.alignment(is_64bit);
    (alignment - size_so_far % alignment) % alignment
}

/// An ordered list of fields describing one native struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructLayout {
    fields: &'static [FieldKind],
}

impl StructLayout {
    /// Describes a struct made of `fields`, in declaration order.
    #[must_use]
    pub const fn new(fields: &'static [FieldKind]) -> Self {
        StructLayout { fields }
    }

    /// The fields in declaration order.
    #[must_use]
    pub const fn fields(&self) -> &'static [FieldKind] {
        self.fields
    }

    /// Offset of each field from the start of the struct.
    #[must_use]
    pub fn offsets(&self, is_64bit: bool) -> Vec<usize> {
        let mut size_so_far = 0;
        self.fields
            .iter()
            .map(|kind| {
                let offset = size_so_far + padding(*kind, size_so_far, is_64bit);
                size_so_far = offset + kind.size(is_64bit);
                offset
            })
            .collect()
    }

    /// End of the last field, without trailing padding.
    #[must_use]
    pub fn fields_end(&self, is_64bit: bool) -> usize {
        self.fields.iter().fold(0, |size_so_far, kind| {
            size_so_far + padding(*kind, size_so_far, is_64bit) + kind.size(is_64bit)
        })
    }

    /// Largest field alignment, 1 for an empty struct.
    #[must_use]
    pub fn alignment(&self, is_64bit: bool) -> usize {
        self.fields
            .iter()
            .map(|kind| kind.alignment(is_64bit))
            .max()
            .unwrap_or(1)
    }

    /// `sizeof` of the struct, i.e. the distance between two consecutive array rows.
    #[must_use]
    pub fn size(&self, is_64bit: bool) -> usize {
        let end = self.fields_end(is_64bit);
        let alignment = self.alignment(is_64bit);
        end + (alignment - end % alignment) % alignment
    }
}

/// A pointer read from a struct, still unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pointer(pub u64);

impl Pointer {
    /// `true` for a null pointer.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// A `const char*` slot.
///
/// The slot records where it lives inside the symbol so the string can be resolved through
/// [`crate::elf::SymbolAccessor::string_from_pointer_field`], which also honours dynamic
/// relocations targeting the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringSlot {
    /// Offset of the slot from the start of the symbol data
    pub offset: usize,
    /// Value stored in the file at that slot
    pub raw: u64,
}

/// A scalar that can appear as a field of a native struct.
pub trait NativeField: Sized {
    /// The layout kind of this field
    const KIND: FieldKind;

    /// Decodes the field from exactly `KIND.size(is_64bit)` bytes found at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `bytes` is shorter than the field.
    fn decode(bytes: &[u8], offset: usize, is_64bit: bool) -> Result<Self>;
}

impl NativeField for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn decode(bytes: &[u8], _offset: usize, _is_64bit: bool) -> Result<Self> {
        Ok(read_le::<u8>(bytes)? != 0)
    }
}

impl NativeField for u8 {
    const KIND: FieldKind = FieldKind::U8;

    fn decode(bytes: &[u8], _offset: usize, _is_64bit: bool) -> Result<Self> {
        read_le::<u8>(bytes)
    }
}

impl NativeField for u32 {
    const KIND: FieldKind = FieldKind::U32;

    fn decode(bytes: &[u8], _offset: usize, _is_64bit: bool) -> Result<Self> {
        read_le::<u32>(bytes)
    }
}

impl NativeField for i32 {
    const KIND: FieldKind = FieldKind::I32;

    fn decode(bytes: &[u8], _offset: usize, _is_64bit: bool) -> Result<Self> {
        read_le::<i32>(bytes)
    }
}

impl NativeField for u64 {
    const KIND: FieldKind = FieldKind::U64;

    fn decode(bytes: &[u8], _offset: usize, _is_64bit: bool) -> Result<Self> {
        read_le::<u64>(bytes)
    }
}

fn read_pointer_value(bytes: &[u8], is_64bit: bool) -> Result<u64> {
    if is_64bit {
        read_le::<u64>(bytes)
    } else {
        Ok(u64::from(read_le::<u32>(bytes)?))
    }
}

impl NativeField for Pointer {
    const KIND: FieldKind = FieldKind::Pointer;

    fn decode(bytes: &[u8], _offset: usize, is_64bit: bool) -> Result<Self> {
        Ok(Pointer(read_pointer_value(bytes, is_64bit)?))
    }
}

impl NativeField for StringSlot {
    const KIND: FieldKind = FieldKind::String;

    fn decode(bytes: &[u8], offset: usize, is_64bit: bool) -> Result<Self> {
        Ok(StringSlot {
            offset,
            raw: read_pointer_value(bytes, is_64bit)?,
        })
    }
}

/// Reads one field placed after `size_so_far` bytes of the struct that starts at `base`.
///
/// Padding is skipped first. Returns the number of bytes consumed, padding included, so the
/// caller can keep `size_so_far` up to date.
///
/// # Errors
/// Returns [`crate::Error::TruncatedStruct`] if `data` ends before the field does.
pub fn read_field<T: NativeField>(
    data: &[u8],
    base: usize,
    field: &mut T,
    size_so_far: usize,
    is_64bit: bool,
) -> Result<usize> {
    let pad = padding(T::KIND, size_so_far, is_64bit);
    let size = T::KIND.size(is_64bit);
    let start = base + size_so_far + pad;
    let end = start + size;

    if end > data.len() {
        return Err(Error::TruncatedStruct {
            needed: end - base,
            available: data.len().saturating_sub(base),
        });
    }

    *field = T::decode(&data[start..end], start, is_64bit)?;
    Ok(pad + size)
}

/// Sequential reader over one struct instance.
///
/// The reader checks up front that the buffer can hold every field of `layout`, so a short
/// buffer fails before any field is decoded and nothing is ever zero-filled.
pub struct StructReader<'a> {
    data: &'a [u8],
    base: usize,
    size_so_far: usize,
    is_64bit: bool,
}

impl<'a> StructReader<'a> {
    /// Creates a reader for the struct starting at `base` within `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStruct`] if fewer than `layout.fields_end()` bytes are
    /// available from `base`.
    pub fn new(
        data: &'a [u8],
        base: usize,
        layout: &StructLayout,
        is_64bit: bool,
    ) -> Result<Self> {
        let needed = layout.fields_end(is_64bit);
        let available = data.len().saturating_sub(base);
        if available < needed {
            return Err(Error::TruncatedStruct { needed, available });
        }

        Ok(StructReader {
            data,
            base,
            size_so_far: 0,
            is_64bit,
        })
    }

    /// Reads the next field.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStruct`] if the field lies past the buffer.
    pub fn read<T: NativeField + Default>(&mut self) -> Result<T> {
        let mut value = T::default();
        self.size_so_far += read_field(
            self.data,
            self.base,
            &mut value,
            self.size_so_far,
            self.is_64bit,
        )?;
        Ok(value)
    }

    /// Bytes consumed so far, padding included.
    #[must_use]
    pub fn size_so_far(&self) -> usize {
        self.size_so_far
    }
}

/// Splits a symbol's data into the start offsets of its complete rows.
///
/// The row count is `floor(len / stride)`; a trailing partial row is dropped.
#[must_use]
pub fn row_offsets(data_len: usize, layout: &StructLayout, is_64bit: bool) -> Vec<usize> {
    let stride = layout.size(is_64bit);
    if stride == 0 {
        return Vec::new();
    }

    let rows = data_len / stride;
    if data_len % stride != 0 {
        log::debug!(
            "Dropping {} trailing bytes, not enough for a {stride} byte row",
            data_len % stride
        );
    }

    (0..rows).map(|row| row * stride).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    // struct { bool a; uint64_t b; bool c; uint32_t d; const char *e; }
    const MIXED: StructLayout = StructLayout::new(&[
        FieldKind::Bool,
        FieldKind::U64,
        FieldKind::Bool,
        FieldKind::U32,
        FieldKind::String,
    ]);

    #[test]
    fn field_sizes() {
        for kind in FieldKind::iter() {
            assert_eq!(kind.size(true), kind.alignment(true));
            assert_eq!(kind.size(false), kind.alignment(false));
        }
        assert_eq!(FieldKind::Pointer.size(false), 4);
        assert_eq!(FieldKind::String.size(true), 8);
        assert_eq!(FieldKind::Bool.size(true), 1);
    }

    #[test]
    fn padding_rules() {
        assert_eq!(padding(FieldKind::U32, 1, true), 3);
        assert_eq!(padding(FieldKind::U32, 4, true), 0);
        assert_eq!(padding(FieldKind::U64, 12, false), 4);
        assert_eq!(padding(FieldKind::Pointer, 12, false), 0);
        assert_eq!(padding(FieldKind::Pointer, 12, true), 4);
        assert_eq!(padding(FieldKind::Bool, 7, true), 0);
    }

    #[test]
    fn natural_c_sizes() {
        // 64-bit: a@0, b@8, c@16, d@20, e@24, sizeof 32
        assert_eq!(MIXED.offsets(true), vec![0, 8, 16, 20, 24]);
        assert_eq!(MIXED.size(true), 32);
        // 32-bit: a@0, b@8, c@16, d@20, e@24, end 28, sizeof 32 (u64 aligned to 8)
        assert_eq!(MIXED.offsets(false), vec![0, 8, 16, 20, 24]);
        assert_eq!(MIXED.fields_end(false), 28);
        assert_eq!(MIXED.size(false), 32);

        // struct { uint32_t token; void *klass; }
        let class = StructLayout::new(&[FieldKind::U32, FieldKind::Pointer]);
        assert_eq!(class.size(true), 16);
        assert_eq!(class.size(false), 8);

        // struct { bool x; uint8_t y; }
        let bytes = StructLayout::new(&[FieldKind::Bool, FieldKind::U8]);
        assert_eq!(bytes.size(true), 2);

        assert_eq!(StructLayout::new(&[]).size(true), 0);
    }

    #[test]
    fn read_field_sequence_matches_layout() {
        for is_64bit in [false, true] {
            let data = vec![0xAA_u8; MIXED.size(is_64bit)];
            let mut size_so_far = 0;
            let mut flag = false;
            let mut wide = 0u64;
            let mut word = 0u32;
            let mut slot = StringSlot::default();

            size_so_far += read_field(&data, 0, &mut flag, size_so_far, is_64bit).unwrap();
            size_so_far += read_field(&data, 0, &mut wide, size_so_far, is_64bit).unwrap();
            size_so_far += read_field(&data, 0, &mut flag, size_so_far, is_64bit).unwrap();
            size_so_far += read_field(&data, 0, &mut word, size_so_far, is_64bit).unwrap();
            size_so_far += read_field(&data, 0, &mut slot, size_so_far, is_64bit).unwrap();

            assert_eq!(size_so_far, MIXED.fields_end(is_64bit));
            assert!(flag);
            assert_eq!(word, 0xAAAA_AAAA);
            assert_eq!(slot.offset, 24);
        }
    }

    #[test]
    fn struct_reader_values() {
        #[rustfmt::skip]
        let data = [
            0x01, 0x00, 0x00, 0x00,
            0x78, 0x56, 0x34, 0x12,
            0x00, 0x10, 0x00, 0x00,
        ];
        let layout = StructLayout::new(&[FieldKind::Bool, FieldKind::U32, FieldKind::String]);

        let mut reader = StructReader::new(&data, 0, &layout, false).unwrap();
        assert!(reader.read::<bool>().unwrap());
        assert_eq!(reader.read::<u32>().unwrap(), 0x1234_5678);
        let slot = reader.read::<StringSlot>().unwrap();
        assert_eq!(slot, StringSlot { offset: 8, raw: 0x1000 });
        assert_eq!(reader.size_so_far(), 12);
    }

    #[test]
    fn truncated_struct_is_rejected() {
        let layout = StructLayout::new(&[FieldKind::U32, FieldKind::U64]);
        let data = [0u8; 12];

        match StructReader::new(&data, 0, &layout, true) {
            Err(Error::TruncatedStruct { needed, available }) => {
                assert_eq!(needed, 16);
                assert_eq!(available, 12);
            }
            _ => panic!("short buffer must not decode"),
        }

        let mut value = 0u64;
        assert!(matches!(
            read_field(&data, 0, &mut value, 8, true),
            Err(Error::TruncatedStruct { .. })
        ));
    }

    #[test]
    fn rows_drop_partial_tail() {
        let layout = StructLayout::new(&[FieldKind::U32, FieldKind::Pointer]);
        assert_eq!(row_offsets(40, &layout, true), vec![0, 16]);
        assert_eq!(row_offsets(16, &layout, false), vec![0, 8]);
        assert!(row_offsets(7, &layout, false).is_empty());
    }
}
