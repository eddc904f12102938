//! Operator number parsing

/// Decimal value of the digits in `line`.
///
/// Anything that is not an ASCII digit is skipped, so `b"12a3"` reads as 123
/// and an empty line as 0. The result wraps at 32 bits, like the register it
/// is written to.
pub fn parse_decimal(line: &[u8]) -> u32 {
    line.iter()
        .filter(|byte| byte.is_ascii_digit())
        .fold(0u32, |acc, digit| {
            acc.wrapping_mul(10).wrapping_add(u32::from(digit - b'0'))
        })
}
