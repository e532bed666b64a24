#![allow(dead_code)]

pub const MAJOR_POS: u8 = 0;
pub const MAJOR_NEG: u8 = 1;
pub const MAJOR_BYTES: u8 = 2;
pub const MAJOR_STR: u8 = 3;
pub const MAJOR_ARRAY: u8 = 4;
pub const MAJOR_DICT: u8 = 5;
pub const MAJOR_TAG: u8 = 6;
pub const MAJOR_LIT: u8 = 7;

pub const TAG_BIGNUM_POS: u64 = 2;
pub const TAG_BIGNUM_NEG: u64 = 3;
pub const TAG_BIGDECIMAL: u64 = 4;
pub const TAG_BIGFLOAT: u64 = 5;
pub const TAG_SELF_DESCRIBE: u64 = 55799;

pub const LIT_FALSE: u8 = 20;
pub const LIT_TRUE: u8 = 21;
pub const LIT_NULL: u8 = 22;
pub const LIT_UNDEFINED: u8 = 23;
pub const LIT_FLOAT16: u8 = 25;
pub const LIT_FLOAT32: u8 = 26;
pub const LIT_FLOAT64: u8 = 27;

/// Additional-info values 24–27 select a 1/2/4/8 byte suffix.
pub const INFO_U8: u8 = 24;
pub const INFO_U16: u8 = 25;
pub const INFO_U32: u8 = 26;
pub const INFO_U64: u8 = 27;

pub const INDEFINITE_SIZE: u8 = 31;
pub const STOP_BYTE: u8 = 0xff;

/// Compose an initial byte from major type and additional info.
#[inline]
pub const fn initial(major: u8, info: u8) -> u8 {
    major << 5 | info
}

/// The self-describe tag 55799 as encoded on the wire, usable as a file magic.
pub const SELF_DESCRIBE_BYTES: [u8; 3] = [0xd9, 0xd9, 0xf7];
