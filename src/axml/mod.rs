//! Android binary XML ("AXML") decoding.
//!
//! Compiled resources such as `AndroidManifest.xml` are stored as a flat stream of chunks: a
//! document header, a string pool, then namespace and element start/end records whose names
//! and values are indexes into the pool. [`parse`] rebuilds the element tree from that
//! stream, rendering typed attribute values the way `aapt dump xmltree` does.
//!
//! Damage that leaves the rest of the document readable (unknown chunks, odd header sizes,
//! unbalanced namespaces) is logged and skipped. Damage to the document header or the string
//! pool fails decoding with [`crate::Error::InvalidData`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use apkscope::axml;
//!
//! let data = std::fs::read("AndroidManifest.xml")?;
//! let document = axml::parse(&data)?;
//! if let Some(root) = document.root() {
//!     println!("package: {:?}", root.attribute("package"));
//! }
//! println!("{}", document.to_xml_string()?);
//! # Ok::<(), apkscope::Error>(())
//! ```

pub mod chunk;
pub mod document;
pub mod stringpool;
pub mod value;

mod parser;

pub use chunk::{ChunkHeader, ChunkType};
pub use document::{XmlAttribute, XmlDocument, XmlElement, ANDROID_NAMESPACE};
pub use stringpool::StringPool;
pub use value::{format_value, ValueType};

use crate::{file::io::read_le, Result};
use parser::AxmlParser;

/// Decodes a binary XML document.
///
/// # Errors
/// Returns [`crate::Error::InvalidData`] when the input is shorter than a chunk header, the
/// document header or string pool is invalid, the declared size exceeds the input, a
/// resource map is misaligned, or a string entry is corrupt.
pub fn parse(data: &[u8]) -> Result<XmlDocument> {
    AxmlParser::new(data)?.parse()
}

/// Returns `true` if `data` starts with a binary XML document header.
#[must_use]
pub fn is_axml(data: &[u8]) -> bool {
    matches!(
        (read_le::<u16>(data), data.get(2..).map(read_le::<u16>)),
        (Ok(kind), Some(Ok(header_size)))
            if kind == ChunkType::Xml as u16 && header_size == chunk::CHUNK_HEADER_SIZE
    )
}
