// Author: kelexine (https://github.com/kelexine)
// args/convert.rs — Value-token conversion for typed options

use std::path::PathBuf;

/// Conversion from a single command-line token.
///
/// `None` means the token does not hold exactly one value of this type.
pub trait FromToken: Sized {
    /// Type name used in conversion error messages.
    const EXPECTED: &'static str;

    fn from_token(token: &str) -> Option<Self>;
}

impl FromToken for String {
    const EXPECTED: &'static str = "string";

    fn from_token(token: &str) -> Option<Self> {
        Some(token.to_string())
    }
}

impl FromToken for PathBuf {
    const EXPECTED: &'static str = "path";

    fn from_token(token: &str) -> Option<Self> {
        Some(PathBuf::from(token))
    }
}

macro_rules! primitive_from_token {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromToken for $ty {
                const EXPECTED: &'static str = $name;

                fn from_token(token: &str) -> Option<Self> {
                    token.parse().ok()
                }
            }
        )*
    };
}

primitive_from_token! {
    f32 => "float",
    f64 => "float",
    bool => "boolean",
    char => "character",
}

macro_rules! integer_from_token {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromToken for $ty {
                const EXPECTED: &'static str = "integer";

                fn from_token(token: &str) -> Option<Self> {
                    let value = parse_integer(token)?;
                    <$ty>::try_from(value).ok()
                }
            }
        )*
    };
}

integer_from_token!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Parse an integer with an optional leading `-` and an optional `0x`/`0X`
/// hexadecimal prefix. The whole token must be consumed; the first
/// character after the sign must be a digit.
pub fn parse_integer(token: &str) -> Option<i128> {
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    if !body.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let (radix, digits) = match body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, body),
    };

    if digits.is_empty() {
        return None;
    }

    let mut value: i128 = 0;
    for ch in digits.chars() {
        let digit = ch.to_digit(radix)?;
        value = value
            .checked_mul(radix as i128)?
            .checked_add(digit as i128)?;
    }

    Some(if negative { -value } else { value })
}
