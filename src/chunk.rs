//! Fixed-size batching of the universe.

use std::slice::Chunks;

use crate::error::ValidationError;

/// Split `items` into contiguous batches of `size`, the last one possibly shorter.
///
/// The returned iterator is lazy and `Clone`, so it can be re-run from the
/// start. An empty slice yields no batches.
pub fn chunk<T>(items: &[T], size: usize) -> Result<Chunks<'_, T>, ValidationError> {
    if size == 0 {
        return Err(ValidationError::InvalidChunkSize(size));
    }
    Ok(items.chunks(size))
}

/// Number of batches `chunk` yields for `len` items.
pub fn chunk_count(len: usize, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    len.div_ceil(size)
}
