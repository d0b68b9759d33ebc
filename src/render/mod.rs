//! Turning validated values into bar images.

mod patterns;
mod png;

use image::GrayImage;

use crate::{
    encoder::{self, Symbology},
    error::ValidationError,
};

use patterns::{code128_modules, code128b_values, ean13_modules};

pub use png::{print_sheet, save_png, PngRenderer};

/// Produces a visual barcode for a `(value, symbology)` pair.
pub trait Renderer {
    fn render(&self, value: &str, symbology: Symbology) -> Result<GrayImage, ValidationError>;
}

/// Module sequence (`true` = bar) for `value`, quiet zones excluded.
///
/// UPC-A is drawn as the EAN-13 with a leading zero, which is the same
/// symbol.
pub fn encode_modules(value: &str, symbology: Symbology) -> Result<Vec<bool>, ValidationError> {
    encoder::ensure_valid(value, symbology)?;

    match symbology {
        Symbology::UpcA => {
            let digits: Vec<u8> = std::iter::once(0)
                .chain(value.bytes().map(|byte| byte - b'0'))
                .collect();
            Ok(ean13_modules(&digits))
        }
        Symbology::Ean13 => {
            let digits: Vec<u8> = value.bytes().map(|byte| byte - b'0').collect();
            Ok(ean13_modules(&digits))
        }
        Symbology::Code128 => code128b_values(value)
            .map(|values| code128_modules(&values))
            .map_err(|ch| ValidationError::Unencodable { symbology, ch }),
    }
}
