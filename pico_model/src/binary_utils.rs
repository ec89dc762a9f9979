use byteorder::{ByteOrder, LE};
use zerocopy::{FromBytes, LayoutVerified};

use crate::{Error, FileType, Result};

#[must_use]
pub fn null_terminated_prefix(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.is_empty() {
        return None;
    }
    bytes.splitn(2, |&b| b == 0).next()
}

/// Reads a fixed-size, nul padded name field.
#[must_use]
pub fn fixed_str(bytes: &[u8]) -> String {
    null_terminated_prefix(bytes)
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_default()
}

/// Reads a little-endian `i32` at `offset`, if the buffer is long enough.
#[must_use]
pub fn read_i32(bytes: &[u8], offset: usize) -> Option<i32> {
    bytes.get(offset..offset + 4).map(LE::read_i32)
}

#[must_use]
pub fn parse<T: FromBytes>(bytes: &[u8], offset: usize) -> Option<&T> {
    bytes
        .get(offset..)
        .and_then(LayoutVerified::<_, T>::new_from_prefix)
        .map(|(res, _)| res.into_ref())
}

#[must_use]
pub fn parse_slice<T: FromBytes>(bytes: &[u8], offset: usize, count: usize) -> Option<&[T]> {
    if count == 0 {
        return Some(&[]);
    }

    bytes
        .get(offset..)
        .and_then(|bytes| LayoutVerified::new_slice_from_prefix(bytes, count))
        .map(|(res, _)| res.into_slice())
}

pub fn parse_mut<'a, T: FromBytes>(bytes: &mut &'a [u8]) -> Option<&'a T> {
    LayoutVerified::<_, T>::new_from_prefix(*bytes).map(|(res, remaining)| {
        *bytes = remaining;
        res.into_ref()
    })
}

pub fn parse_slice_mut<'a, T: FromBytes>(bytes: &mut &'a [u8], count: usize) -> Option<&'a [T]> {
    if count == 0 {
        return Some(&[]);
    }

    LayoutVerified::new_slice_from_prefix(*bytes, count).map(|(res, remaining)| {
        *bytes = remaining;
        res.into_slice()
    })
}

/// Converts a count field, failing if it's negative.
///
/// # Errors
///
/// Returns `Err` with the given message if `value` is negative.
pub fn count(value: i32, ty: FileType, error: &'static str) -> Result<usize> {
    value.try_into().map_err(|_| Error::Corrupted { ty, error })
}

/// Resolves an offset field relative to `base`, failing if it points before the start of the file.
///
/// # Errors
///
/// Returns `Err` with the given message if the resolved offset is negative.
pub fn offset(base: usize, value: i32, ty: FileType, error: &'static str) -> Result<usize> {
    let value = isize::try_from(value).map_err(|_| Error::Corrupted { ty, error })?;
    base.checked_add_signed(value)
        .ok_or(Error::Corrupted { ty, error })
}
