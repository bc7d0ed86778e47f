use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Scalar quantity stored in milli-units (1000 milli-units = 1 unit).
///
/// Parses the decimal notation used for resource quantities and metric
/// targets: a bare number is whole units (`"2"` = 2000 milli), the `m`
/// suffix is milli-units (`"500m"` = 500), and fractions are accepted down
/// to milli precision (`"1.5"` = 1500). JSON numbers are accepted as whole
/// units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(i64);

impl Quantity {
    pub fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    pub fn from_units(units: i64) -> Self {
        Quantity(units * 1000)
    }

    /// The quantity in milli-units, the unit all ratio arithmetic runs in.
    pub fn milli_value(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid quantity {0:?}")]
pub struct ParseQuantityError(String);

impl FromStr for Quantity {
    type Err = ParseQuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseQuantityError(input.to_string()));
        }

        let (number, is_milli) = match trimmed.strip_suffix('m') {
            Some(rest) => (rest, true),
            None => (trimmed, false),
        };

        let (sign, digits) = match number.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, number),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(ParseQuantityError(input.to_string()));
        }
        // Fractions of a milli-unit are not representable.
        let scale = if is_milli { 1 } else { 1000 };
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseQuantityError(input.to_string()));
        }
        let max_frac_digits = if is_milli { 0 } else { 3 };
        if frac.len() > max_frac_digits {
            return Err(ParseQuantityError(input.to_string()));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| ParseQuantityError(input.to_string()))?
        };
        let mut frac_milli: i64 = 0;
        if !frac.is_empty() {
            let parsed: i64 = frac.parse().map_err(|_| ParseQuantityError(input.to_string()))?;
            frac_milli = parsed * 10i64.pow((3 - frac.len()) as u32);
        }

        Ok(Quantity(sign * (whole * scale + frac_milli)))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}", self.0 / 1000)
        } else {
            write!(f, "{}m", self.0)
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuantityVisitor;

        impl Visitor<'_> for QuantityVisitor {
            type Value = Quantity;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a quantity string (\"500m\", \"2\") or a number of whole units")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Quantity, E> {
                value.parse().map_err(de::Error::custom)
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Quantity, E> {
                Ok(Quantity::from_units(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Quantity, E> {
                Ok(Quantity::from_units(value as i64))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Quantity, E> {
                Ok(Quantity::from_milli((value * 1000.0).round() as i64))
            }
        }

        deserializer.deserialize_any(QuantityVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whole_units() {
        assert_eq!("2".parse::<Quantity>().unwrap().milli_value(), 2000);
        assert_eq!("0".parse::<Quantity>().unwrap().milli_value(), 0);
        assert_eq!("150".parse::<Quantity>().unwrap().milli_value(), 150_000);
    }

    #[test]
    fn parse_milli_suffix() {
        assert_eq!("500m".parse::<Quantity>().unwrap().milli_value(), 500);
        assert_eq!("1500m".parse::<Quantity>().unwrap().milli_value(), 1500);
    }

    #[test]
    fn parse_fractions() {
        assert_eq!("1.5".parse::<Quantity>().unwrap().milli_value(), 1500);
        assert_eq!("0.25".parse::<Quantity>().unwrap().milli_value(), 250);
        assert_eq!(".5".parse::<Quantity>().unwrap().milli_value(), 500);
    }

    #[test]
    fn parse_negative() {
        assert_eq!("-2".parse::<Quantity>().unwrap().milli_value(), -2000);
        assert_eq!("-250m".parse::<Quantity>().unwrap().milli_value(), -250);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Quantity>().is_err());
        assert!("m".parse::<Quantity>().is_err());
        assert!("2x".parse::<Quantity>().is_err());
        assert!("1.5m".parse::<Quantity>().is_err());
        assert!("0.0001".parse::<Quantity>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for input in ["500m", "2", "1500m", "0"] {
            let quantity: Quantity = input.parse().unwrap();
            assert_eq!(quantity.to_string(), input);
        }
    }

    #[test]
    fn deserialize_string_and_number() {
        let from_string: Quantity = serde_json::from_str("\"750m\"").unwrap();
        assert_eq!(from_string.milli_value(), 750);
        let from_int: Quantity = serde_json::from_str("3").unwrap();
        assert_eq!(from_int.milli_value(), 3000);
        let from_float: Quantity = serde_json::from_str("1.5").unwrap();
        assert_eq!(from_float.milli_value(), 1500);
    }
}
