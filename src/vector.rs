//! Top-level vectored read: multirange attempt with fallbacks.
//!
//! `pread_vec` fetches many byte ranges of one resource with as few HTTP
//! round-trips as the server allows. Ranges are packed into multi-range
//! `Range` headers; a cooperating server answers 206 multipart/byteranges.
//! Servers that ignore the header (200) get the full body scattered into
//! the ranges, unless the body dwarfs the request, and servers that
//! mangle multirange entirely are retried with one request per range.

use crate::context::ReadContext;
use crate::error::VecError;
use crate::multipart::{self, MultipartOutcome};
use crate::range_header::{generate_range_headers, range_pair};
use crate::request::{HttpClient, HttpRequest};
use crate::scatter;

/// One requested byte range and the caller buffer receiving its bytes.
/// The requested size is the buffer length. Overlapping and out-of-order
/// ranges are allowed; each buffer is an independent destination.
#[derive(Debug)]
pub struct RangeChunk<'a> {
    pub offset: u64,
    pub buffer: &'a mut [u8],
}

/// How the bytes were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VecReadStatus {
    /// The server honored the multi-range request.
    Multirange,
    /// The server sent the whole file; the ranges were scattered out of it.
    WholeFile,
    /// Every range was fetched with its own request.
    SingleRanges,
}

/// Result of a vectored read: bytes delivered per input range
/// (index-paired with the request vector) and the grand total.
#[derive(Debug)]
pub struct VecRead {
    pub total: u64,
    pub sizes: Vec<u64>,
    pub status: VecReadStatus,
}

enum MultirangeStatus {
    Success,
    SuccessWholeFile,
    /// The server cannot be trusted with multirange; retry range by range.
    NoMultirange,
}

struct MultirangeResult {
    status: MultirangeStatus,
    total: u64,
}

/// Read all `chunks` from the resource described by `ctx`.
pub fn pread_vec<C: HttpClient>(
    ctx: &ReadContext<'_, C>,
    chunks: &mut [RangeChunk<'_>],
) -> Result<VecRead, VecError> {
    if chunks.is_empty() {
        return Ok(VecRead {
            total: 0,
            sizes: Vec::new(),
            status: VecReadStatus::SingleRanges,
        });
    }
    let mut sizes = vec![0u64; chunks.len()];

    // a lot of servers do not support multirange; honor the opt-out
    if chunks.len() == 1 || ctx.fragment_param("multirange").as_deref() == Some("false") {
        let total = simulate_multirange(ctx, chunks, &mut sizes)?;
        return Ok(VecRead {
            total,
            sizes,
            status: VecReadStatus::SingleRanges,
        });
    }

    tracing::debug!("vector read over {} ranges", chunks.len());
    let res = perform_multirange(ctx, chunks, &mut sizes)?;
    match res.status {
        MultirangeStatus::Success => Ok(VecRead {
            total: res.total,
            sizes,
            status: VecReadStatus::Multirange,
        }),
        MultirangeStatus::SuccessWholeFile => Ok(VecRead {
            total: res.total,
            sizes,
            status: VecReadStatus::WholeFile,
        }),
        MultirangeStatus::NoMultirange => {
            tracing::debug!("multirange unusable, recovering with single-range requests");
            for s in sizes.iter_mut() {
                *s = 0;
            }
            let total = simulate_multirange(ctx, chunks, &mut sizes)?;
            Ok(VecRead {
                total,
                sizes,
                status: VecReadStatus::SingleRanges,
            })
        }
    }
}

/// One `pread` per range, in order.
fn simulate_multirange<C: HttpClient>(
    ctx: &ReadContext<'_, C>,
    chunks: &mut [RangeChunk<'_>],
    sizes: &mut [u64],
) -> Result<u64, VecError> {
    tracing::debug!("simulating a multirange request with {} ranges", chunks.len());
    let mut total = 0u64;
    for (i, chunk) in chunks.iter_mut().enumerate() {
        let n = ctx.pread(chunk.buffer, chunk.offset)?;
        sizes[i] = n;
        total += n;
    }
    Ok(total)
}

fn perform_multirange<C: HttpClient>(
    ctx: &ReadContext<'_, C>,
    chunks: &mut [RangeChunk<'_>],
    sizes: &mut [u64],
) -> Result<MultirangeResult, VecError> {
    // approximate when ranges overlap, which is fine for the guard
    let bytes_to_read: u64 = chunks.iter().map(|c| c.buffer.len() as u64).sum();

    let pairs: Vec<(u64, u64)> = chunks
        .iter()
        .map(|c| range_pair(c.offset, c.buffer.len() as u64))
        .collect();
    let header_values =
        generate_range_headers(ctx.config.byte_range_header_budget, pairs.into_iter());

    let mut total = 0u64;
    let mut base = 0usize;
    for (count, value) in header_values {
        tracing::debug!("range group of {} chunks", count);

        // one range only: no need for multipart
        if count == 1 {
            let chunk = &mut chunks[base];
            let n = ctx.pread(chunk.buffer, chunk.offset)?;
            sizes[base] = n;
            total += n;
            base += 1;
            continue;
        }

        let range = [(String::from("Range"), format!("bytes={}", value))];
        let mut req = ctx.client.get(ctx.url, ctx.params, &range)?;
        req.begin()?;
        let code = req.status();
        match code {
            206 => {
                let group = &mut chunks[base..base + count];
                let group_sizes = &mut sizes[base..base + count];
                match multipart::parse_multipart_response(&mut req, group, group_sizes)? {
                    MultipartOutcome::Parsed(n) => {
                        total += n;
                        req.end()?;
                    }
                    MultipartOutcome::NotMultipart => {
                        let _ = req.end();
                        return Ok(MultirangeResult {
                            status: MultirangeStatus::NoMultirange,
                            total,
                        });
                    }
                }
            }
            200 => {
                // server ignored the Range header and is sending the file
                let answer = req.answer_size().unwrap_or(0);
                if answer > ctx.config.full_body_threshold
                    && answer > ctx.config.full_body_overfetch_factor * bytes_to_read
                {
                    tracing::debug!(
                        "{} byte body for {} requested bytes, not worth streaming",
                        answer,
                        bytes_to_read
                    );
                    let _ = req.end();
                    return Ok(MultirangeResult {
                        status: MultirangeStatus::NoMultirange,
                        total,
                    });
                }
                tracing::debug!("simulating the multirange answer from the whole file");
                let n = scatter::scatter_full_body(&mut req, chunks, sizes)?;
                req.end()?;
                // the body covered every range, including earlier groups
                return Ok(MultirangeResult {
                    status: MultirangeStatus::SuccessWholeFile,
                    total: n,
                });
            }
            _ => {
                let _ = req.end();
                return Err(VecError::Http(code));
            }
        }
        base += count;
    }

    Ok(MultirangeResult {
        status: MultirangeStatus::Success,
        total,
    })
}
