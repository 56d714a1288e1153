//! Cursor-style binary parser.
//!
//! [`Parser`] walks a byte slice sequentially while keeping track of its position. It is the
//! workhorse behind the AXML chunk walker, the string pool and the assembly-store header
//! reader. All reads are bounds-checked and fail with [`crate::Error::OutOfBounds`] instead of
//! panicking.
//!
//! # Examples
//!
//! ```rust
//! use apkscope::Parser;
//!
//! let data = [0x03, 0x00, 0x08, 0x00, 0x40, 0x00, 0x00, 0x00];
//! let mut parser = Parser::new(&data);
//!
//! let chunk_type: u16 = parser.read_le()?;
//! let header_size: u16 = parser.read_le()?;
//! let size: u32 = parser.read_le()?;
//! assert_eq!((chunk_type, header_size, size), (3, 8, 64));
//! assert!(!parser.has_more_data());
//! # Ok::<(), apkscope::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, NativeIO},
    Result,
};

/// A generic binary data parser for reading structured little-endian data.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] from a byte slice.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to exactly the end of the data is allowed; it leaves the parser exhausted.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Read a little-endian `T` from the current position and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: NativeIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Returns the number of bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }
}
