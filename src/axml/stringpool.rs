//! The `ResStringPool` chunk of a binary XML document.
//!
//! All names, namespace URIs and string attribute values of the document live here and are
//! referenced by index. Strings are decoded on first access and memoized per index.

use std::cell::OnceCell;

use widestring::U16Str;

use crate::{
    axml::chunk::{ChunkHeader, ChunkType},
    file::{io::read_le, parser::Parser},
    Result,
};

/// Exact header size of a string pool chunk in binary XML.
pub const STRING_POOL_HEADER_SIZE: u16 = 28;

/// Flag marking a pool whose strings are UTF-8 rather than UTF-16.
pub const UTF8_FLAG: u32 = 0x100;

/// Flag marking a pool whose strings are sorted.
pub const SORTED_FLAG: u32 = 0x1;

/// A parsed string pool borrowing the document bytes.
pub struct StringPool<'a> {
    data: &'a [u8],
    header: ChunkHeader,
    flags: u32,
    style_count: u32,
    offsets: Vec<u32>,
    strings_start: usize,
    strings_end: usize,
    cache: Vec<OnceCell<Option<String>>>,
}

impl<'a> StringPool<'a> {
    /// Parses the string pool chunk at the parser's position and moves the parser past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidData`] if the chunk is not a string pool, if its header
    /// size is not 28, or if its offsets point outside the chunk.
    pub fn read(parser: &mut Parser<'a>) -> Result<StringPool<'a>> {
        let header = ChunkHeader::read_expecting(parser, ChunkType::StringPool)?;
        if header.header_size != STRING_POOL_HEADER_SIZE {
            return Err(invalid_data!(
                header.start,
                "string pool header size {} != {}",
                header.header_size,
                STRING_POOL_HEADER_SIZE
            ));
        }
        if header.end() > parser.len() {
            return Err(invalid_data!(
                header.start,
                "string pool of {} bytes exceeds the document",
                header.size
            ));
        }

        let string_count = parser.read_le::<u32>()?;
        let style_count = parser.read_le::<u32>()?;
        let flags = parser.read_le::<u32>()?;
        let strings_start = parser.read_le::<u32>()? as usize;
        let styles_start = parser.read_le::<u32>()? as usize;

        let offsets_size = string_count as usize * 4;
        if header.body() + offsets_size > header.end() {
            return Err(invalid_data!(
                header.start,
                "{} string offsets do not fit the string pool",
                string_count
            ));
        }
        let mut offsets = Vec::with_capacity(string_count as usize);
        for _ in 0..string_count {
            offsets.push(parser.read_le::<u32>()?);
        }
        // style offsets and style spans carry no information for XML reconstruction

        let region_end = if style_count > 0 {
            styles_start
        } else {
            header.size as usize
        };
        if strings_start > region_end || region_end > header.size as usize {
            return Err(invalid_data!(
                header.start,
                "string data region 0x{:x}..0x{:x} is outside the chunk",
                strings_start,
                region_end
            ));
        }
        if (region_end - strings_start) % 4 != 0 {
            log::warn!(
                "String data region size {} is not a multiple of 4",
                region_end - strings_start
            );
        }

        parser.seek(header.end())?;

        Ok(StringPool {
            data: parser.data(),
            header,
            flags,
            style_count,
            offsets,
            strings_start: header.start + strings_start,
            strings_end: header.start + region_end,
            cache: (0..string_count).map(|_| OnceCell::new()).collect(),
        })
    }

    /// Number of strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `true` if the pool holds no strings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Number of styles, which are never decoded.
    #[must_use]
    pub fn style_count(&self) -> u32 {
        self.style_count
    }

    /// Returns `true` for UTF-8 pools.
    #[must_use]
    pub fn is_utf8(&self) -> bool {
        self.flags & UTF8_FLAG != 0
    }

    /// Returns `true` if the pool declares its strings sorted.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.flags & SORTED_FLAG != 0
    }

    /// The string at `index`; `None` for an out of range index, `0xFFFFFFFF` included.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidData`] if the entry is corrupt: a length running past
    /// the string data or a missing NUL terminator.
    pub fn get(&self, index: u32) -> Result<Option<&str>> {
        let Some(cell) = self.cache.get(index as usize) else {
            return Ok(None);
        };
        if let Some(value) = cell.get() {
            return Ok(value.as_deref());
        }

        let decoded = self.decode(index as usize)?;
        Ok(cell.get_or_init(|| decoded).as_deref())
    }

    fn decode(&self, index: usize) -> Result<Option<String>> {
        let offset = self.strings_start + self.offsets[index] as usize;
        if offset >= self.strings_end {
            return Err(invalid_data!(
                offset,
                "string {} starts past the string data",
                index
            ));
        }

        if self.is_utf8() {
            self.decode_utf8(offset)
        } else {
            self.decode_utf16(offset)
        }
    }

    fn decode_utf8(&self, offset: usize) -> Result<Option<String>> {
        let mut position = offset;
        // character count first, then the encoded byte count
        let _chars = self.read_length(&mut position, 1)?;
        let bytes = self.read_length(&mut position, 1)?;
        let raw = self.terminated(offset, position, bytes, 1)?;

        let value = match std::str::from_utf8(raw) {
            Ok(value) => value.to_string(),
            Err(_) => match cesu8::from_java_cesu8(raw) {
                Ok(value) => value.into_owned(),
                Err(_) => {
                    log::warn!("String at 0x{offset:x} is not valid UTF-8, replacing bad bytes");
                    String::from_utf8_lossy(raw).into_owned()
                }
            },
        };
        Ok(Some(value))
    }

    fn decode_utf16(&self, offset: usize) -> Result<Option<String>> {
        let mut position = offset;
        let units = self.read_length(&mut position, 2)?;
        let raw = self.terminated(offset, position, units, 2)?;

        let wide: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let wide = U16Str::from_slice(&wide);
        let value = match wide.to_string() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("String at 0x{offset:x} is not valid UTF-16, replacing bad units");
                wide.to_string_lossy()
            }
        };
        Ok(Some(value))
    }

    /// Reads a one or two unit length prefix, `unit` being 1 (UTF-8) or 2 (UTF-16) bytes.
    fn read_length(&self, position: &mut usize, unit: usize) -> Result<usize> {
        let bits = 8 * unit;
        let high = 0x80u32 << (8 * (unit - 1));

        let first = self.read_unit(*position, unit)?;
        *position += unit;
        if first & high == 0 {
            return Ok(first as usize);
        }

        let second = self.read_unit(*position, unit)?;
        *position += unit;
        Ok((((first & !high) << bits) | second) as usize)
    }

    fn read_unit(&self, position: usize, unit: usize) -> Result<u32> {
        if position + unit > self.strings_end {
            return Err(invalid_data!(position, "string length runs past the string data"));
        }
        let bytes = &self.data[position..];
        if unit == 1 {
            Ok(u32::from(read_le::<u8>(bytes)?))
        } else {
            Ok(u32::from(read_le::<u16>(bytes)?))
        }
    }

    /// The `count` units at `start`, checking for the NUL unit that must follow them.
    fn terminated(&self, entry: usize, start: usize, count: usize, unit: usize) -> Result<&'a [u8]> {
        let end = start + count * unit;
        if end + unit > self.strings_end {
            return Err(invalid_data!(
                entry,
                "string of {} units runs past the string data",
                count
            ));
        }
        if self.data[end..end + unit].iter().any(|byte| *byte != 0) {
            return Err(invalid_data!(entry, "string is not NUL-terminated"));
        }
        Ok(&self.data[start..end])
    }

    /// The chunk header of the pool.
    #[must_use]
    pub fn header(&self) -> &ChunkHeader {
        &self.header
    }
}
