//! Contiguous typed-array get/put, built on [`super::order`]'s scalar codec.
//!
//! These are the "typed view" materializers used by `tree::Node` (spec.md
//! section 4.4: typed views are lazily materialized from raw payload bytes).

use super::order::{
    get_f32, get_f64, get_i16, get_i32, get_i64, get_u16, get_u32, get_u64, put_f32, put_f64,
    put_i16, put_i32, put_i64, put_u16, put_u32, put_u64, ByteOrder,
};
use crate::error::Result;

macro_rules! array_io {
    ($get:ident, $put:ident, $elem_get:ident, $elem_put:ident, $ty:ty, $width:expr) => {
        #[doc = concat!("Reads a contiguous array of ", stringify!($ty), " starting at `offset`.")]
        pub fn $get(buf: &[u8], offset: usize, count: usize, order: ByteOrder) -> Result<Vec<$ty>> {
            let mut out = Vec::with_capacity(count);
            for i in 0..count {
                out.push($elem_get(buf, offset + i * $width, order)?);
            }
            Ok(out)
        }

        #[doc = concat!("Writes a contiguous array of ", stringify!($ty), " starting at `offset`.")]
        pub fn $put(buf: &mut [u8], offset: usize, values: &[$ty], order: ByteOrder) -> Result<()> {
            for (i, v) in values.iter().enumerate() {
                $elem_put(buf, offset + i * $width, *v, order)?;
            }
            Ok(())
        }
    };
}

array_io!(get_u16_array, put_u16_array, get_u16, put_u16, u16, 2);
array_io!(get_i16_array, put_i16_array, get_i16, put_i16, i16, 2);
array_io!(get_u32_array, put_u32_array, get_u32, put_u32, u32, 4);
array_io!(get_i32_array, put_i32_array, get_i32, put_i32, i32, 4);
array_io!(get_u64_array, put_u64_array, get_u64, put_u64, u64, 8);
array_io!(get_i64_array, put_i64_array, get_i64, put_i64, i64, 8);
array_io!(get_f32_array, put_f32_array, get_f32, put_f32, f32, 4);
array_io!(get_f64_array, put_f64_array, get_f64, put_f64, f64, 8);

/// Reads `count` raw bytes (the char8/uchar8 element types share this view).
pub fn get_u8_array(buf: &[u8], offset: usize, count: usize) -> Result<Vec<u8>> {
    if offset + count > buf.len() {
        return Err(crate::error::EvioError::Bounds(format!(
            "byte array read of {count} at {offset} exceeds buffer of length {}",
            buf.len()
        )));
    }
    Ok(buf[offset..offset + count].to_vec())
}

/// Writes `values` as raw bytes at `offset`.
pub fn put_u8_array(buf: &mut [u8], offset: usize, values: &[u8]) -> Result<()> {
    if offset + values.len() > buf.len() {
        return Err(crate::error::EvioError::Bounds(format!(
            "byte array write of {} at {offset} exceeds buffer of length {}",
            values.len(),
            buf.len()
        )));
    }
    buf[offset..offset + values.len()].copy_from_slice(values);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_array_round_trip() {
        let mut buf = [0u8; 16];
        let values = [1u32, 2, 3, 0xFFFF_FFFF];
        put_u32_array(&mut buf, 0, &values, ByteOrder::BigEndian).unwrap();
        let out = get_u32_array(&buf, 0, 4, ByteOrder::BigEndian).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn f64_array_round_trip_little_endian() {
        let mut buf = [0u8; 16];
        let values = [1.5f64, -2.25];
        put_f64_array(&mut buf, 0, &values, ByteOrder::LittleEndian).unwrap();
        let out = get_f64_array(&buf, 0, 2, ByteOrder::LittleEndian).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn u8_array_round_trip() {
        let mut buf = [0u8; 4];
        put_u8_array(&mut buf, 0, &[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(get_u8_array(&buf, 0, 3).unwrap(), vec![0xAA, 0xBB, 0xCC]);
    }
}
