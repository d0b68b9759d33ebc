//! Weighted modulo-10 check digits used by UPC-A and EAN-13.

/// `(10 - Σ wᵢ·dᵢ mod 10) mod 10`, with `even_weight` applied at even
/// (0-based) positions and `odd_weight` at odd ones.
pub(crate) fn weighted_check_digit(digits: &[u8], even_weight: u32, odd_weight: u32) -> u8 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(index, &digit)| {
            let weight = if index % 2 == 0 { even_weight } else { odd_weight };
            u32::from(digit) * weight
        })
        .sum();

    ((10 - sum % 10) % 10) as u8
}

/// Parse an ASCII digit string into digit values. `None` on any other byte.
pub(crate) fn parse_digits(raw: &str) -> Option<Vec<u8>> {
    raw.bytes()
        .map(|byte| byte.is_ascii_digit().then(|| byte - b'0'))
        .collect()
}
