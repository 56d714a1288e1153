//! Typed attribute values (`Res_value`) and their textual form.

use strum::{Display, FromRepr};

/// Multipliers for the four radix positions of a complex value.
pub const RADIX_MULTIPLIERS: [f32; 4] = [
    0.003_906_25,
    3.051_758e-5,
    1.192_093e-7,
    4.656_613e-10,
];

/// Units of `Dimension` values, indexed by the low nibble of the data.
pub const DIMENSION_UNITS: [&str; 6] = ["px", "dip", "sp", "pt", "in", "mm"];

/// Units of `Fraction` values, indexed by the low nibble of the data.
pub const FRACTION_UNITS: [&str; 2] = ["%", "%p"];

const COMPLEX_UNIT_MASK: u32 = 0x0F;

/// Data types of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum ValueType {
    /// No data; `data` 0 means undefined, 1 means explicitly empty
    Null = 0x00,
    /// Resource reference, `@id`
    Reference = 0x01,
    /// Theme attribute reference, `?id`
    Attribute = 0x02,
    /// String pool index
    String = 0x03,
    /// Floating point, rendered as the numeric value of `data`
    Float = 0x04,
    /// Complex dimension
    Dimension = 0x05,
    /// Complex fraction
    Fraction = 0x06,
    /// Reference to a resource of a dynamically loaded package
    DynamicReference = 0x07,
    /// Attribute of a dynamically loaded package
    DynamicAttribute = 0x08,
    /// Decimal integer, rendered unsigned
    IntDec = 0x10,
    /// Hexadecimal integer
    IntHex = 0x11,
    /// Boolean
    IntBoolean = 0x12,
    /// `#aarrggbb`
    IntColorArgb8 = 0x1C,
    /// `#rrggbb`
    IntColorRgb8 = 0x1D,
    /// `#argb`
    IntColorArgb4 = 0x1E,
    /// `#rgb`
    IntColorRgb4 = 0x1F,
}

/// Decodes a complex value (dimension or fraction) without its unit.
///
/// The mantissa is taken as an unsigned quantity, so the sign bit scales the value up rather
/// than negating it.
#[must_use]
pub fn complex_to_float(data: u32) -> f32 {
    let mantissa = (data & 0xFFFF_FF00) as f32;
    mantissa * RADIX_MULTIPLIERS[((data >> 4) & 3) as usize]
}

fn unit_suffix(units: &[&'static str], data: u32) -> &'static str {
    let index = (data & COMPLEX_UNIT_MASK) as usize;
    match units.get(index) {
        Some(unit) => unit,
        None => {
            log::warn!("Unit index {index} of complex value 0x{data:08x} is out of range");
            ""
        }
    }
}

fn package_prefix(data: u32) -> &'static str {
    if data >> 24 == 1 {
        "android:"
    } else {
        ""
    }
}

/// Renders an attribute value as text.
///
/// `string` resolves string pool indexes for `String` values; an unresolvable index renders
/// as an empty string.
pub fn format_value<F>(value_type: u8, data: u32, string: F) -> String
where
    F: FnOnce(u32) -> Option<String>,
{
    let Some(kind) = ValueType::from_repr(value_type) else {
        log::warn!("Unknown attribute value type 0x{value_type:02x} (data 0x{data:08x})");
        return String::new();
    };

    match kind {
        ValueType::Null => {
            if data == 0 {
                "?NULL?".to_string()
            } else {
                String::new()
            }
        }
        ValueType::Reference | ValueType::DynamicReference => {
            format!("@{}{data:08x}", package_prefix(data))
        }
        ValueType::Attribute | ValueType::DynamicAttribute => {
            format!("?{}{data:08x}", package_prefix(data))
        }
        ValueType::String => string(data).unwrap_or_default(),
        ValueType::Float => (data as f32).to_string(),
        ValueType::Dimension => {
            format!(
                "{}{}",
                complex_to_float(data),
                unit_suffix(&DIMENSION_UNITS, data)
            )
        }
        ValueType::Fraction => {
            format!(
                "{}{}",
                complex_to_float(data) * 100.0,
                unit_suffix(&FRACTION_UNITS, data)
            )
        }
        ValueType::IntDec => data.to_string(),
        ValueType::IntHex => format!("0x{data:08X}"),
        ValueType::IntBoolean => {
            if data == 0 {
                "false".to_string()
            } else {
                "true".to_string()
            }
        }
        ValueType::IntColorArgb8
        | ValueType::IntColorRgb8
        | ValueType::IntColorArgb4
        | ValueType::IntColorRgb4 => format!("#{data:08X}"),
    }
}
