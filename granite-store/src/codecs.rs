//! Order-preserving `u64` encodings for index keys.
//!
//! Sparse-index tuples and date bounds are compared as plain `u64`s, so
//! signed and floating-point key columns must be mapped into an encoding
//! where the integer order matches the source order. Unsigned columns
//! widen as-is. Consumers share these helpers so index construction and
//! predicate literals agree on the encoding.

#[inline(always)]
pub fn sortable_u64_from_f64(val: f64) -> u64 {
    let bits = val.to_bits();
    if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000_0000_0000
    }
}

#[inline(always)]
pub fn sortable_u64_from_f32(val: f32) -> u64 {
    sortable_u64_from_f64(val as f64)
}

#[inline(always)]
pub fn sortable_u64_from_i8(val: i8) -> u64 {
    ((val as u8) ^ 0x80) as u64
}

#[inline(always)]
pub fn sortable_u64_from_i16(val: i16) -> u64 {
    ((val as u16) ^ 0x8000) as u64
}

#[inline(always)]
pub fn sortable_u64_from_i32(val: i32) -> u64 {
    ((val as u32) ^ 0x8000_0000) as u64
}

#[inline(always)]
pub fn sortable_u64_from_i64(val: i64) -> u64 {
    (val as u64) ^ 0x8000_0000_0000_0000
}
