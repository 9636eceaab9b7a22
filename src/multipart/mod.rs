//! multipart/byteranges response parsing.
//!
//! Drives the part-header parser once per requested range, validates every
//! part against the range it is supposed to carry, and routes the part body
//! into the caller's buffer for that range.

mod boundary;
mod part_header;

use crate::error::VecError;
use crate::request::HttpRequest;
use crate::vector::RangeChunk;

/// Block size for the final response drain.
const DRAIN_BLOCK: usize = 255;

/// What became of a 206 response.
#[derive(Debug)]
pub enum MultipartOutcome {
    /// Parsed; total bytes copied into caller buffers.
    Parsed(u64),
    /// The response carries no usable multipart framing: no boundary in
    /// `Content-Type`, or no boundary line before the first part. Some
    /// object stores answer 206 and then send only the first range this
    /// way. The caller falls back to single-range requests.
    NotMultipart,
}

/// Parse a 206 multipart/byteranges response into the caller buffers.
///
/// `chunks` and `sizes` are index-paired; `sizes[i]` receives the bytes
/// delivered for `chunks[i]`. Parts must arrive in request order. A server
/// that closes the stream early (closing boundary before every part was
/// seen) is not an error; the remaining sizes stay 0.
pub fn parse_multipart_response<R: HttpRequest>(
    req: &mut R,
    chunks: &mut [RangeChunk<'_>],
    sizes: &mut [u64],
) -> Result<MultipartOutcome, VecError> {
    debug_assert_eq!(chunks.len(), sizes.len());

    let content_type = req.answer_header("Content-Type").unwrap_or_default();
    let boundary = match boundary::extract_boundary(&content_type) {
        Ok(b) => b,
        Err(_) => {
            tracing::trace!("no multipart boundary in content type {:?}", content_type);
            return Ok(MultipartOutcome::NotMultipart);
        }
    };
    tracing::debug!("multipart boundary {:?}", boundary);

    let mut total = 0u64;
    for i in 0..chunks.len() {
        let info = match part_header::read_part_header(req, &boundary) {
            Ok(info) => info,
            Err(e) if i == 0 => {
                tracing::debug!(
                    "first part header unparseable ({}), treating response as non-multipart",
                    e
                );
                return Ok(MultipartOutcome::NotMultipart);
            }
            Err(e) => return Err(e),
        };
        if info.is_end_marker() {
            tracing::debug!("closing boundary after {} of {} parts", i, chunks.len());
            break;
        }

        let chunk = &mut chunks[i];
        let req_size = chunk.buffer.len() as u64;
        if req_size != 0 && (info.offset != chunk.offset || info.size != req_size) {
            return Err(VecError::RangeMismatch {
                req_offset: chunk.offset,
                req_size,
                part_offset: info.offset,
                part_size: info.size,
            });
        }

        sizes[i] = copy_part_body(req, chunk)?;
        total += sizes[i];
        tracing::trace!("part {} delivered {} bytes", i, sizes[i]);
    }

    drain(req);
    Ok(MultipartOutcome::Parsed(total))
}

/// Copy one part body into the chunk buffer, returning the bytes delivered.
///
/// A zero-size range was requested as `o-o`, so the server answers with one
/// byte; that byte has to be pulled off the stream to keep the next part
/// header aligned, and the delivered size stays 0.
fn copy_part_body<R: HttpRequest>(
    req: &mut R,
    chunk: &mut RangeChunk<'_>,
) -> Result<u64, VecError> {
    if chunk.buffer.is_empty() {
        let mut sentinel = [0u8; 1];
        req.read_exact(&mut sentinel)?;
        return Ok(0);
    }
    req.read_exact(chunk.buffer)?;
    Ok(chunk.buffer.len() as u64)
}

/// Best-effort read of whatever the server still has to say, so the
/// underlying connection can be reused.
fn drain<R: HttpRequest>(req: &mut R) {
    let mut scratch = [0u8; DRAIN_BLOCK];
    while matches!(req.read_block(&mut scratch), Ok(n) if n > 0) {}
}
