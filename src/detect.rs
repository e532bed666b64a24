use crate::constants::*;

/// Strength of the guess that a byte sequence starts a CBOR document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FormatMatch {
    NoMatch,
    /// A plausible document-initial byte, shared with other formats.
    Weak,
    /// A structural opening or the self-describe prefix.
    Solid,
}

/// Judge from the first byte(s) whether the input is CBOR.
///
/// The self-describe prefix `D9 D9 F7` and structural openings (arrays and
/// maps) give a solid match; scalars that could equally start something
/// else only a weak one.
pub fn format_match(bytes: &[u8]) -> FormatMatch {
    let first = match bytes.first() {
        Some(b) => *b,
        None => return FormatMatch::NoMatch,
    };
    if first == SELF_DESCRIBE_BYTES[0] {
        return if bytes.len() >= 3 {
            if bytes[..3] == SELF_DESCRIBE_BYTES {
                FormatMatch::Solid
            } else {
                FormatMatch::Weak
            }
        } else {
            FormatMatch::Weak
        };
    }
    let info = first & 0x1f;
    match first >> 5 {
        MAJOR_ARRAY | MAJOR_DICT => FormatMatch::Solid,
        MAJOR_POS | MAJOR_NEG => {
            if info <= INFO_U64 {
                FormatMatch::Weak
            } else {
                FormatMatch::NoMatch
            }
        }
        MAJOR_BYTES | MAJOR_STR => {
            // strings with 4/8-byte length headers are implausible openers
            if info <= INFO_U16 || info == INDEFINITE_SIZE {
                FormatMatch::Weak
            } else {
                FormatMatch::NoMatch
            }
        }
        MAJOR_TAG => FormatMatch::Weak,
        MAJOR_LIT => match info {
            LIT_FALSE | LIT_TRUE | LIT_NULL | LIT_FLOAT16 | LIT_FLOAT32 | LIT_FLOAT64 => {
                FormatMatch::Weak
            }
            _ => FormatMatch::NoMatch,
        },
        _ => unreachable!("major type is three bits"),
    }
}
