//! Simulates a multirange answer out of a 200 full-body stream.
//!
//! The body is streamed exactly once; every block is scatter-copied into
//! the requested ranges it overlaps. Ranges are kept in an offset-sorted
//! index walked by two forward-only cursors, so each block only visits the
//! ranges that can intersect it.

use crate::error::VecError;
use crate::request::HttpRequest;
use crate::vector::RangeChunk;

/// Streaming block size for the full-body walk.
const READ_BLOCK_SIZE: usize = 32 * 1024;

/// One requested range in the offset-sorted interval index.
struct Entry {
    chunk_index: usize,
    offset: u64,
    size: u64,
    written: u64,
}

/// Stream the whole response body and scatter it into the chunk buffers.
///
/// Overlapping and out-of-order ranges are fine; each entry receives its
/// bytes independently. A resource shorter than a requested range yields a
/// short per-range size, not an error. `sizes` is reset first: a 200
/// answer covers every range, including any served by an earlier request.
///
/// Returns the total number of bytes written across all ranges.
pub fn scatter_full_body<R: HttpRequest>(
    req: &mut R,
    chunks: &mut [RangeChunk<'_>],
    sizes: &mut [u64],
) -> Result<u64, VecError> {
    debug_assert_eq!(chunks.len(), sizes.len());
    for s in sizes.iter_mut() {
        *s = 0;
    }

    let mut entries: Vec<Entry> = chunks
        .iter()
        .enumerate()
        .map(|(i, c)| Entry {
            chunk_index: i,
            offset: c.offset,
            size: c.buffer.len() as u64,
            written: 0,
        })
        .collect();
    entries.sort_by_key(|e| e.offset);

    let mut buffer = vec![0u8; READ_BLOCK_SIZE];
    let mut pos: u64 = 0;
    let mut start = 0usize;
    let mut end = 0usize;

    loop {
        let len = req.read_block(&mut buffer)?;
        if len == 0 {
            break;
        }
        let block = &buffer[..len];

        // entries fully before the window fall out at the front...
        while start < entries.len() && pos > entries[start].offset + entries[start].size {
            start += 1;
        }
        // ...and entries whose range has begun join at the back
        while end < entries.len() && pos + len as u64 > entries[end].offset {
            end += 1;
        }

        for e in &mut entries[start..end] {
            if e.written >= e.size {
                continue;
            }
            let cursor = e.offset + e.written;
            if cursor < pos {
                continue;
            }
            let read_offset = (cursor - pos) as usize;
            if read_offset >= len {
                continue;
            }
            let want = ((e.size - e.written) as usize).min(len - read_offset);
            let at = e.written as usize;
            chunks[e.chunk_index].buffer[at..at + want]
                .copy_from_slice(&block[read_offset..read_offset + want]);
            e.written += want as u64;
        }
        pos += len as u64;
    }

    let mut total = 0u64;
    for e in &entries {
        sizes[e.chunk_index] = e.written;
        total += e.written;
    }
    tracing::debug!("scattered {} bytes from a {}-byte body", total, pos);
    Ok(total)
}
