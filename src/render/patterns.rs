//! Bar/space module patterns for the supported symbologies.

/// EAN "L" (odd parity) digit codes; "R" codes are their complement and "G"
/// codes are "R" reversed.
const EAN_L_CODES: [&str; 10] = [
    "0001101", "0011001", "0010011", "0111101", "0100011",
    "0110001", "0101111", "0111011", "0110111", "0001011",
];

/// L/G parity of the six left-hand digits, selected by the leading EAN digit.
const EAN_PARITY: [&str; 10] = [
    "LLLLLL", "LLGLGG", "LLGGLG", "LLGGGL", "LGLLGG",
    "LGGLLG", "LGGGLL", "LGLGLG", "LGLGGL", "LGGLGL",
];

const EAN_GUARD: &str = "101";
const EAN_CENTER: &str = "01010";

/// Code 128 element widths (bar, space, bar, space, bar, space) for symbol
/// values 0..=105, followed by the 7-element stop pattern at 106.
pub(crate) const CODE128_WIDTHS: [&str; 107] = [
    "212222", "222122", "222221", "121223", "121322", "131222", "122213", "122312", "132212",
    "221213", "221312", "231212", "112232", "122132", "122231", "113222", "123122", "123221",
    "223211", "221132", "221231", "213212", "223112", "312131", "311222", "321122", "321221",
    "312212", "322112", "322211", "212123", "212321", "232121", "111323", "131123", "131321",
    "112313", "132113", "132311", "211313", "231113", "231311", "112133", "112331", "132131",
    "113123", "113321", "133121", "313121", "211331", "231131", "213113", "213311", "213131",
    "311123", "311321", "331121", "312113", "312311", "332111", "314111", "221411", "431111",
    "111224", "111422", "121124", "121421", "141122", "141221", "112214", "112412", "122114",
    "122411", "142112", "142211", "241211", "221114", "413111", "241112", "134111", "111242",
    "121142", "121241", "114212", "124112", "124211", "411212", "421112", "421211", "212141",
    "214121", "412121", "111143", "111341", "131141", "114113", "114311", "411113", "411311",
    "113141", "114131", "311141", "411131", "211412", "211214", "211232", "2331112",
];

pub(crate) const CODE128_START_B: usize = 104;
pub(crate) const CODE128_STOP: usize = 106;
const CODE128_CHECK_MODULUS: usize = 103;

fn push_bits(modules: &mut Vec<bool>, bits: &str) {
    modules.extend(bits.bytes().map(|bit| bit == b'1'));
}

fn push_widths(modules: &mut Vec<bool>, widths: &str) {
    for (index, width) in widths.bytes().enumerate() {
        let is_bar = index % 2 == 0;
        modules.extend(std::iter::repeat(is_bar).take(usize::from(width - b'0')));
    }
}

/// 95 modules for a 13-digit EAN value. Caller guarantees 13 ASCII digits.
pub(crate) fn ean13_modules(digits: &[u8]) -> Vec<bool> {
    let mut modules = Vec::with_capacity(95);
    let parity = EAN_PARITY[usize::from(digits[0])].as_bytes();

    push_bits(&mut modules, EAN_GUARD);
    for (position, &digit) in digits[1..7].iter().enumerate() {
        let l_code = EAN_L_CODES[usize::from(digit)];
        if parity[position] == b'G' {
            // G = reverse(complement(L))
            let g_code: String = l_code
                .bytes()
                .rev()
                .map(|bit| if bit == b'1' { '0' } else { '1' })
                .collect();
            push_bits(&mut modules, &g_code);
        } else {
            push_bits(&mut modules, l_code);
        }
    }
    push_bits(&mut modules, EAN_CENTER);
    for &digit in &digits[7..13] {
        let r_code: String = EAN_L_CODES[usize::from(digit)]
            .bytes()
            .map(|bit| if bit == b'1' { '0' } else { '1' })
            .collect();
        push_bits(&mut modules, &r_code);
    }
    push_bits(&mut modules, EAN_GUARD);

    modules
}

/// Code set B symbol values, or the first character outside printable ASCII.
pub(crate) fn code128b_values(value: &str) -> Result<Vec<usize>, char> {
    value
        .chars()
        .map(|ch| match ch {
            ' '..='~' => Ok(ch as usize - 32),
            other => Err(other),
        })
        .collect()
}

/// Start B, data, mod-103 check symbol, stop.
pub(crate) fn code128_modules(values: &[usize]) -> Vec<bool> {
    let check = values
        .iter()
        .enumerate()
        .fold(CODE128_START_B, |sum, (index, value)| sum + (index + 1) * value)
        % CODE128_CHECK_MODULUS;

    let mut modules = Vec::with_capacity((values.len() + 3) * 11 + 2);
    push_widths(&mut modules, CODE128_WIDTHS[CODE128_START_B]);
    for &value in values {
        push_widths(&mut modules, CODE128_WIDTHS[value]);
    }
    push_widths(&mut modules, CODE128_WIDTHS[check]);
    push_widths(&mut modules, CODE128_WIDTHS[CODE128_STOP]);
    modules
}
