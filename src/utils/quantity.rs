// Copyright 2025 The MinIO Operator Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Exact arithmetic on Kubernetes resource quantities (`16Ti`, `500m`, `1e3`).
//!
//! Capacity sizing must never round, so quantities are parsed into integer
//! thousandths of a unit and any value that cannot be represented that way is
//! rejected instead of truncated.

use crate::types::error::{Error, InvalidQuantitySnafu};

const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 10),
    ("Mi", 20),
    ("Gi", 30),
    ("Ti", 40),
    ("Pi", 50),
    ("Ei", 60),
];

const DECIMAL_SUFFIXES: [(&str, u32); 6] = [
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

fn invalid(value: &str, message: &str) -> Error {
    InvalidQuantitySnafu { value, message }.build()
}

/// Parses a quantity into thousandths of its base unit.
pub fn parse_milli(value: &str) -> Result<i128, Error> {
    let s = value.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid(value, "missing number"));
    }
    if frac_part.contains('.') {
        return Err(invalid(value, "more than one decimal point"));
    }

    let mantissa: i128 = format!("{int_part}{frac_part}")
        .parse()
        .map_err(|_| invalid(value, "number out of range"))?;

    let (num, den): (i128, i128) = match suffix {
        "" => (1, 1),
        "m" => (1, 1000),
        s => {
            if let Some((_, shift)) = BINARY_SUFFIXES.iter().find(|(sfx, _)| *sfx == s) {
                (1i128 << shift, 1)
            } else if let Some((_, exp)) = DECIMAL_SUFFIXES.iter().find(|(sfx, _)| *sfx == s) {
                (10i128.pow(*exp), 1)
            } else if let Some(exp) = s.strip_prefix(['e', 'E']) {
                let exp: i32 = exp
                    .parse()
                    .map_err(|_| invalid(value, "malformed exponent"))?;
                let pow = 10i128
                    .checked_pow(exp.unsigned_abs())
                    .ok_or_else(|| invalid(value, "exponent out of range"))?;
                if exp >= 0 { (pow, 1) } else { (1, pow) }
            } else {
                return Err(invalid(value, "unknown suffix"));
            }
        }
    };

    let frac_len = u32::try_from(frac_part.len()).map_err(|_| invalid(value, "too many digits"))?;
    let den = 10i128
        .checked_pow(frac_len)
        .and_then(|scale| den.checked_mul(scale))
        .ok_or_else(|| invalid(value, "too many digits"))?;
    let scaled = mantissa
        .checked_mul(num)
        .and_then(|v| v.checked_mul(1000))
        .ok_or_else(|| invalid(value, "number out of range"))?;

    if scaled % den != 0 {
        return Err(invalid(value, "finer than one thousandth of a unit"));
    }

    let milli = scaled / den;
    Ok(if negative { -milli } else { milli })
}

/// Parses a quantity that must be a positive, whole number of bytes.
pub fn parse_bytes(value: &str) -> Result<u64, Error> {
    let milli = parse_milli(value)?;
    if milli <= 0 || milli % 1000 != 0 {
        return Err(invalid(value, "must be a positive whole number of bytes"));
    }
    u64::try_from(milli / 1000).map_err(|_| invalid(value, "too large"))
}

/// Renders bytes with the largest binary suffix that divides them exactly.
pub fn format_bytes(bytes: u64) -> String {
    for (suffix, shift) in BINARY_SUFFIXES.iter().rev() {
        let unit = 1u64 << shift;
        if bytes >= unit && bytes % unit == 0 {
            return format!("{}{}", bytes / unit, suffix);
        }
    }
    bytes.to_string()
}

/// Splits a total capacity evenly across `parts` volumes.
///
/// Fails when the division leaves a remainder: a pool must never silently
/// lose or gain bytes.
pub fn divide_exact(total: &str, parts: i32) -> Result<String, Error> {
    if parts <= 0 {
        return Err(invalid(total, "cannot divide across zero volumes"));
    }
    let bytes = parse_bytes(total)?;
    let parts = u64::from(parts.unsigned_abs());
    if bytes % parts != 0 {
        return Err(invalid(
            total,
            &format!("not evenly divisible across {parts} volumes"),
        ));
    }
    Ok(format_bytes(bytes / parts))
}

/// Two quantities are equal when they spell the same amount (`1Gi` == `1024Mi`).
pub fn semantic_eq(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    matches!((parse_milli(a), parse_milli(b)), (Ok(x), Ok(y)) if x == y)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binary_and_decimal_suffixes() {
        assert_eq!(parse_bytes("1Ki").unwrap(), 1024);
        assert_eq!(parse_bytes("16Ti").unwrap(), 16 * (1u64 << 40));
        assert_eq!(parse_bytes("2G").unwrap(), 2_000_000_000);
        assert_eq!(parse_bytes("1e3").unwrap(), 1000);
        assert_eq!(parse_milli("500m").unwrap(), 500);
        assert_eq!(parse_milli("0.5").unwrap(), 500);
        assert_eq!(parse_milli("1.5Gi").unwrap(), 1_610_612_736_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_milli("").is_err());
        assert!(parse_milli("Gi").is_err());
        assert!(parse_milli("10Qi").is_err());
        assert!(parse_milli("1.2.3").is_err());
        assert!(parse_bytes("500m").is_err());
        assert!(parse_bytes("0").is_err());
    }

    #[test]
    fn test_divide_exact() {
        assert_eq!(divide_exact("32Ti", 32).unwrap(), "1Ti");
        assert_eq!(divide_exact("16Ti", 32).unwrap(), "512Gi");
        assert_eq!(divide_exact("1000", 8).unwrap(), "125");
        assert!(divide_exact("1000", 3).is_err());
        assert!(divide_exact("1Ti", 0).is_err());
    }

    #[test]
    fn test_divide_then_multiply_is_lossless() {
        for (total, volumes) in [("16Ti", 16), ("48Gi", 12), ("7Mi", 7), ("1Ei", 64)] {
            let per_volume = divide_exact(total, volumes).unwrap();
            assert_eq!(
                parse_bytes(&per_volume).unwrap() * volumes as u64,
                parse_bytes(total).unwrap(),
                "{total} across {volumes} volumes"
            );
        }
    }

    #[test]
    fn test_semantic_eq() {
        assert!(semantic_eq("1Gi", "1024Mi"));
        assert!(semantic_eq("500m", "0.5"));
        assert!(semantic_eq("1", "1000m"));
        assert!(!semantic_eq("1Gi", "1G"));
        assert!(!semantic_eq("abc", "abd"));
    }
}
