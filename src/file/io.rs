//! Bounds-checked primitive reads.
//!
//! Every native structure this library decodes is little-endian; Android targets are
//! little-endian only.
//!
//! # Examples
//!
//! ```rust
//! use apkscope::file::io::{read_le, read_le_at};
//!
//! let data = [0x58, 0x41, 0x42, 0x41, 0x02, 0x00];
//! let magic: u32 = read_le(&data)?;
//! assert_eq!(magic, 0x4142_4158);
//!
//! let mut offset = 4;
//! let version: u16 = read_le_at(&data, &mut offset)?;
//! assert_eq!((version, offset), (2, 6));
//! # Ok::<(), apkscope::Error>(())
//! ```

use crate::Result;

/// Trait for fixed-width primitives that can be decoded from raw bytes.
///
/// Each implementation names the byte array matching its width through [`NativeIO::Bytes`].
pub trait NativeIO: Sized {
    /// Byte array type for this numeric type (e.g. `[u8; 4]` for `u32`).
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_native_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl NativeIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_native_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

fn take<T: NativeIO>(data: &[u8], offset: &mut usize) -> Result<T::Bytes> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(read)
}

/// Reads a value of type `T` in little-endian byte order from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: NativeIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Reads a little-endian `T` at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes; `offset` is left
/// untouched in that case.
pub fn read_le_at<T: NativeIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    Ok(T::from_le_bytes(take::<T>(data, offset)?))
}
