//! Resource chunk headers shared by every part of a binary XML file.

use strum::{Display, EnumIter, FromRepr};

use crate::{file::parser::Parser, Result};

/// Size of the common chunk header.
pub const CHUNK_HEADER_SIZE: u16 = 8;

/// Chunk types that can appear in a binary XML file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, FromRepr)]
#[repr(u16)]
pub enum ChunkType {
    /// `RES_NULL_TYPE`
    Null = 0x0000,
    /// `RES_STRING_POOL_TYPE`
    StringPool = 0x0001,
    /// `RES_TABLE_TYPE`
    Table = 0x0002,
    /// `RES_XML_TYPE`, the top-level chunk of a binary XML file
    Xml = 0x0003,
    /// `RES_XML_START_NAMESPACE_TYPE`
    XmlStartNamespace = 0x0100,
    /// `RES_XML_END_NAMESPACE_TYPE`
    XmlEndNamespace = 0x0101,
    /// `RES_XML_START_ELEMENT_TYPE`
    XmlStartElement = 0x0102,
    /// `RES_XML_END_ELEMENT_TYPE`
    XmlEndElement = 0x0103,
    /// `RES_XML_CDATA_TYPE`
    XmlCData = 0x0104,
    /// `RES_XML_RESOURCE_MAP_TYPE`
    XmlResourceMap = 0x0180,
}

/// The `ResChunk_header` that starts every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Raw chunk type
    pub kind: u16,
    /// Size of the chunk header, including this common part
    pub header_size: u16,
    /// Size of the whole chunk, header included
    pub size: u32,
    /// Offset of the chunk in the document
    pub start: usize,
}

impl ChunkHeader {
    /// Reads a chunk header at the parser's position.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidData`] if `header_size < 8` or `size < header_size`,
    /// and [`crate::Error::OutOfBounds`] if fewer than 8 bytes remain.
    pub fn read(parser: &mut Parser) -> Result<ChunkHeader> {
        let start = parser.pos();
        let kind = parser.read_le::<u16>()?;
        let header_size = parser.read_le::<u16>()?;
        let size = parser.read_le::<u32>()?;

        if header_size < CHUNK_HEADER_SIZE {
            return Err(invalid_data!(
                start,
                "chunk header size {} is below {}",
                header_size,
                CHUNK_HEADER_SIZE
            ));
        }
        if size < u32::from(header_size) {
            return Err(invalid_data!(
                start,
                "chunk size {} is smaller than its header ({})",
                size,
                header_size
            ));
        }

        Ok(ChunkHeader {
            kind,
            header_size,
            size,
            start,
        })
    }

    /// Like [`ChunkHeader::read`], but also requires the chunk to be of type `expected`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidData`] on a type mismatch.
    pub fn read_expecting(parser: &mut Parser, expected: ChunkType) -> Result<ChunkHeader> {
        let header = Self::read(parser)?;
        if header.kind != expected as u16 {
            return Err(invalid_data!(
                header.start,
                "expected a {} chunk, found type 0x{:04x}",
                expected,
                header.kind
            ));
        }
        Ok(header)
    }

    /// The known type of this chunk.
    #[must_use]
    pub fn chunk_type(&self) -> Option<ChunkType> {
        ChunkType::from_repr(self.kind)
    }

    /// Offset just past the chunk header.
    #[must_use]
    pub fn body(&self) -> usize {
        self.start + usize::from(self.header_size)
    }

    /// Offset just past the chunk; computed from `size` only.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.size as usize
    }
}
