//! Exact rational numbers.
//!
//! Potentials, costs and LP solutions are all exact rationals; nothing in
//! the analyzer rounds. [`Rational`] is `num_rational::BigRational`. On the
//! wire (JSON/TOML) rationals are strings such as `"3"`, `"-3/2"` or
//! `"0.25"`, read through [`parse_rational`] and written in `n/d` form.

use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

pub type Rational = BigRational;

/// Build a rational from an integer.
pub fn int(n: i64) -> Rational {
    Rational::from_integer(BigInt::from(n))
}

/// Build the rational `numer / denom`. `denom` must not be zero.
pub fn ratio(numer: i64, denom: i64) -> Rational {
    Rational::new(BigInt::from(numer), BigInt::from(denom))
}

/// Error for malformed rational literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRationalError {
    pub input: String,
}

impl fmt::Display for ParseRationalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid rational literal: {:?}", self.input)
    }
}

impl std::error::Error for ParseRationalError {}

/// Parse `"n"`, `"n/d"` or a finite decimal `"i.f"`, with optional sign.
pub fn parse_rational(input: &str) -> Result<Rational, ParseRationalError> {
    let err = || ParseRationalError {
        input: input.to_string(),
    };
    let text = input.trim();
    if text.is_empty() {
        return Err(err());
    }

    if let Some((numer, denom)) = text.split_once('/') {
        let numer: BigInt = numer.trim().parse().map_err(|_| err())?;
        let denom: BigInt = denom.trim().parse().map_err(|_| err())?;
        if denom.is_zero() {
            return Err(err());
        }
        return Ok(Rational::new(numer, denom));
    }

    if let Some((whole, frac)) = text.split_once('.') {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let negative = whole.starts_with('-');
        let whole: BigInt = match whole {
            "" | "-" | "+" => BigInt::zero(),
            w => w.parse().map_err(|_| err())?,
        };
        let scale = BigInt::from(10u32).pow(frac.len() as u32);
        let frac: BigInt = frac.parse().map_err(|_| err())?;
        let magnitude = Rational::new(whole.abs() * &scale + frac, scale);
        return Ok(if negative { -magnitude } else { magnitude });
    }

    let whole: BigInt = text.parse().map_err(|_| err())?;
    Ok(Rational::from_integer(whole))
}

/// Least common multiple of the denominators of `values`. Multiplying
/// every value by it leaves only integers.
pub fn common_denominator<'a>(values: impl IntoIterator<Item = &'a Rational>) -> BigInt {
    let mut lcm = BigInt::one();
    for value in values {
        let denom = value.denom();
        let g = gcd(&lcm, denom);
        lcm = &lcm / &g * denom;
    }
    lcm
}

fn gcd(a: &BigInt, b: &BigInt) -> BigInt {
    let (mut a, mut b) = (a.abs(), b.abs());
    while !b.is_zero() {
        let r = &a % &b;
        a = b;
        b = r;
    }
    a
}

/// `#[serde(with = "amor_common::rational::serde_str")]` for `Rational` fields.
pub mod serde_str {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_rational, Rational};

    pub fn serialize<S: Serializer>(value: &Rational, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rational, D::Error> {
        let text = RationalText::deserialize(deserializer)?;
        let text = match text {
            RationalText::Str(s) => s,
            RationalText::Int(n) => n.to_string(),
        };
        parse_rational(&text).map_err(serde::de::Error::custom)
    }

    /// Integers are accepted too, so hand-written JSON may say `2` instead of `"2"`.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RationalText {
        Str(String),
        Int(i64),
    }
}

/// Same as [`serde_str`] for `Option<Rational>` fields.
pub mod serde_str_option {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_rational, Rational};

    pub fn serialize<S: Serializer>(
        value: &Option<Rational>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Rational>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| parse_rational(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integers_fractions_and_decimals() {
        assert_eq!(parse_rational("3").unwrap(), int(3));
        assert_eq!(parse_rational("-3/2").unwrap(), ratio(-3, 2));
        assert_eq!(parse_rational("6/4").unwrap(), ratio(3, 2));
        assert_eq!(parse_rational("0.25").unwrap(), ratio(1, 4));
        assert_eq!(parse_rational("-1.5").unwrap(), ratio(-3, 2));
        assert_eq!(parse_rational("-0.5").unwrap(), ratio(-1, 2));
    }

    #[test]
    fn rejects_malformed_literals() {
        assert!(parse_rational("").is_err());
        assert!(parse_rational("1/0").is_err());
        assert!(parse_rational("1.").is_err());
        assert!(parse_rational("abc").is_err());
    }

    #[test]
    fn common_denominator_clears_every_fraction() {
        let values = [ratio(3, 2), ratio(-5, 6), int(4), ratio(1, 4)];
        let lcm = common_denominator(&values);
        assert_eq!(lcm, BigInt::from(12));
        let scale = Rational::from_integer(lcm);
        assert!(values.iter().all(|v| (v * &scale).is_integer()));
        assert_eq!(common_denominator(&[int(7), int(-2)]), BigInt::one());
    }

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Holder {
        #[serde(with = "serde_str")]
        value: Rational,
    }

    #[test]
    fn serde_uses_strings() {
        let json = serde_json::to_string(&Holder { value: ratio(5, 2) }).unwrap();
        assert_eq!(json, r#"{"value":"5/2"}"#);
        let back: Holder = serde_json::from_str(r#"{"value":3}"#).unwrap();
        assert_eq!(back.value, int(3));
    }
}
