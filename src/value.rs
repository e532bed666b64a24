use smallvec::SmallVec;
use std::{
    convert::TryFrom,
    fmt::{Display, Formatter},
};

type Magnitude = SmallVec<[u8; 16]>;

/// An integer of arbitrary size, as carried by CBOR tags 2 and 3.
///
/// The `inverted` flag follows the wire representation: the value is
/// `magnitude` when not inverted and `-1 - magnitude` when inverted. The
/// magnitude is stored big-endian without leading zero bytes, so equal
/// values compare equal structurally and round-trip bit-exact through
/// encode/decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInt {
    inverted: bool,
    magnitude: Magnitude,
}

impl BigInt {
    /// Construct from the wire form: sign flag plus big-endian magnitude
    /// (leading zeros are trimmed).
    pub fn from_be_bytes(inverted: bool, bytes: &[u8]) -> Self {
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        Self {
            inverted,
            magnitude: SmallVec::from_slice(&bytes[first..]),
        }
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_be_bytes(false, &value.to_be_bytes())
    }

    pub fn from_i64(value: i64) -> Self {
        Self::from_i128(value.into())
    }

    pub fn from_i128(value: i128) -> Self {
        if value >= 0 {
            Self::from_be_bytes(false, &value.to_be_bytes())
        } else {
            Self::from_be_bytes(true, &(-1 - value).to_be_bytes())
        }
    }

    /// True for values below zero.
    pub fn is_negative(&self) -> bool {
        self.inverted
    }

    /// The wire-form sign flag: the represented value is `-1 - magnitude`
    /// when this is set.
    pub fn inverted(&self) -> bool {
        self.inverted
    }

    /// Big-endian magnitude without leading zeros.
    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    fn magnitude_u128(&self) -> Option<u128> {
        if self.magnitude.len() > 16 {
            return None;
        }
        let mut be = [0u8; 16];
        be[16 - self.magnitude.len()..].copy_from_slice(&self.magnitude);
        Some(u128::from_be_bytes(be))
    }

    pub fn to_i128(&self) -> Option<i128> {
        let m = self.magnitude_u128()?;
        if m > i128::MAX as u128 {
            return None;
        }
        Some(if self.inverted { -1 - m as i128 } else { m as i128 })
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.to_i128().and_then(|v| i64::try_from(v).ok())
    }

    pub fn to_u64(&self) -> Option<u64> {
        if self.inverted {
            return None;
        }
        self.to_i128().and_then(|v| u64::try_from(v).ok())
    }

    /// Closest double-precision approximation.
    pub fn to_f64(&self) -> f64 {
        let mut m = 0.0f64;
        for byte in self.magnitude.iter() {
            m = m * 256.0 + f64::from(*byte);
        }
        if self.inverted {
            -1.0 - m
        } else {
            m
        }
    }

    /// Flip the sign, mapping `m` to `-m`.
    pub fn negate(&self) -> Self {
        if self.inverted {
            Self {
                inverted: false,
                magnitude: add_one(&self.magnitude),
            }
        } else if self.magnitude.is_empty() {
            self.clone()
        } else {
            Self {
                inverted: true,
                magnitude: sub_one(&self.magnitude),
            }
        }
    }

    /// Parse an unsigned decimal digit string into a magnitude.
    pub(crate) fn from_decimal_digits(digits: &str) -> Option<Self> {
        let mut magnitude: Magnitude = SmallVec::new();
        for c in digits.chars() {
            let d = c.to_digit(10)? as u8;
            mul10_add(&mut magnitude, d);
        }
        Some(Self {
            inverted: false,
            magnitude,
        })
    }

    fn to_decimal_digits(&self) -> String {
        // value for printing: m, or m + 1 when inverted (sign added by caller)
        let mut work: Magnitude = if self.inverted {
            add_one(&self.magnitude)
        } else {
            self.magnitude.clone()
        };
        if work.is_empty() {
            return "0".to_owned();
        }
        let mut digits = Vec::new();
        while !work.is_empty() {
            digits.push(b'0' + divmod10(&mut work));
        }
        digits.reverse();
        String::from_utf8(digits).unwrap()
    }
}

impl Display for BigInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.inverted {
            write!(f, "-")?;
        }
        write!(f, "{}", self.to_decimal_digits())
    }
}

impl From<i64> for BigInt {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl From<u64> for BigInt {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

/// A decimal fraction as carried by CBOR tag 4: `unscaled * 10.pow(-scale)`.
///
/// On the wire this is a 2-element array `[exponent, mantissa]` with
/// `exponent == -scale`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigDecimal {
    scale: i64,
    unscaled: BigInt,
}

impl BigDecimal {
    pub fn new(scale: i64, unscaled: BigInt) -> Self {
        Self { scale, unscaled }
    }

    pub fn scale(&self) -> i64 {
        self.scale
    }

    pub fn unscaled(&self) -> &BigInt {
        &self.unscaled
    }

    /// Convert a finite double into its decimal form.
    ///
    /// Goes through the shortest round-trip decimal text of the value, so
    /// `2.5` becomes `25 * 10^-1` instead of the binary expansion of the
    /// nearest representable double. Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let text = format!("{:e}", value);
        // {:e} yields <mantissa>e<exp> with an optional fraction part
        let (mantissa, exp) = text.split_once('e')?;
        let exp: i64 = exp.parse().ok()?;
        let (mantissa, negative) = match mantissa.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (mantissa, false),
        };
        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        let mut digits = String::with_capacity(int_part.len() + frac_part.len());
        digits.push_str(int_part);
        digits.push_str(frac_part);
        let scale = frac_part.len() as i64 - exp;
        let unscaled = BigInt::from_decimal_digits(&digits)?;
        let unscaled = if negative { unscaled.negate() } else { unscaled };
        Some(Self { scale, unscaled })
    }

    /// Truncate toward zero to an integer.
    pub fn to_big_int(&self) -> BigInt {
        let digits = self.unscaled.to_decimal_digits();
        let truncated = if self.scale >= digits.len() as i64 {
            return BigInt::from_i64(0);
        } else if self.scale > 0 {
            digits[..digits.len() - self.scale as usize].to_owned()
        } else {
            let mut d = digits;
            for _ in 0..-self.scale {
                d.push('0');
            }
            d
        };
        let magnitude = BigInt::from_decimal_digits(&truncated).expect("digits are decimal");
        if self.unscaled.is_negative() {
            magnitude.negate()
        } else {
            magnitude
        }
    }

    /// The double-valued conversion of this decimal.
    pub fn to_f64(&self) -> f64 {
        // parsing the decimal text lets the platform float parser do the
        // correct rounding, which plain pow-and-multiply would not
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl Display for BigDecimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.unscaled.is_negative() {
            write!(f, "-")?;
        }
        let digits = self.unscaled.to_decimal_digits();
        if self.scale == 0 {
            write!(f, "{}", digits)
        } else if self.scale < 0 {
            write!(f, "{}", digits)?;
            for _ in 0..-self.scale {
                write!(f, "0")?;
            }
            Ok(())
        } else {
            let scale = self.scale as usize;
            if digits.len() <= scale {
                write!(f, "0.")?;
                for _ in 0..scale - digits.len() {
                    write!(f, "0")?;
                }
                write!(f, "{}", digits)
            } else {
                let (int_part, frac_part) = digits.split_at(digits.len() - scale);
                write!(f, "{}.{}", int_part, frac_part)
            }
        }
    }
}

fn mul10_add(magnitude: &mut Magnitude, digit: u8) {
    let mut carry = u16::from(digit);
    for byte in magnitude.iter_mut().rev() {
        let v = u16::from(*byte) * 10 + carry;
        *byte = v as u8;
        carry = v >> 8;
    }
    while carry > 0 {
        magnitude.insert(0, carry as u8);
        carry >>= 8;
    }
}

fn divmod10(magnitude: &mut Magnitude) -> u8 {
    let mut rem = 0u16;
    for byte in magnitude.iter_mut() {
        let v = (rem << 8) | u16::from(*byte);
        *byte = (v / 10) as u8;
        rem = v % 10;
    }
    while magnitude.first() == Some(&0) {
        magnitude.remove(0);
    }
    rem as u8
}

fn add_one(magnitude: &[u8]) -> Magnitude {
    let mut out: Magnitude = SmallVec::from_slice(magnitude);
    for byte in out.iter_mut().rev() {
        let (v, overflow) = byte.overflowing_add(1);
        *byte = v;
        if !overflow {
            return out;
        }
    }
    out.insert(0, 1);
    out
}

fn sub_one(magnitude: &[u8]) -> Magnitude {
    debug_assert!(!magnitude.is_empty());
    let mut out: Magnitude = SmallVec::from_slice(magnitude);
    for byte in out.iter_mut().rev() {
        let (v, underflow) = byte.overflowing_sub(1);
        *byte = v;
        if !underflow {
            break;
        }
    }
    while out.first() == Some(&0) {
        out.remove(0);
    }
    out
}
