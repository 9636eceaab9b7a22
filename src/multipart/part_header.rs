//! Reads one multipart part header: boundary line, `Content-Range`, blank
//! line. Explicit state machine over the response's line reader.

use crate::error::VecError;
use crate::request::HttpRequest;

/// Line buffer for part header lines.
const LINE_BUF_SIZE: usize = 4096;
/// A part header may not run longer than this many lines; servers that keep
/// emitting headers are cut off instead of being read forever.
const MAX_HEADER_LINES: u32 = 100;

/// Parsed state of one multipart part header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkInfo {
    /// The opening boundary line was seen.
    pub bounded: bool,
    pub offset: u64,
    pub size: u64,
}

impl ChunkInfo {
    /// Terminal marker: closing boundary reached, no further parts.
    pub(crate) fn is_end_marker(&self) -> bool {
        self.bounded && self.offset == 0 && self.size == 0
    }
}

enum State {
    /// Waiting for the opening boundary; blank lines are tolerated.
    Init,
    /// Boundary seen, waiting for `Content-Range`; other headers ignored.
    WantRange,
    /// Range parsed, the next line must be blank.
    WantBlank,
}

enum BoundaryLine {
    Open,
    Close,
    Other,
}

/// Read one part header. Returns the part's range, or the end marker when
/// the closing boundary shows up where a part was expected.
pub(crate) fn read_part_header<R: HttpRequest>(
    req: &mut R,
    boundary: &str,
) -> Result<ChunkInfo, VecError> {
    let mut buf = [0u8; LINE_BUF_SIZE];
    let mut state = State::Init;
    let mut info = ChunkInfo {
        bounded: false,
        offset: 0,
        size: 0,
    };

    for _ in 0..MAX_HEADER_LINES {
        let n = req.read_line(&mut buf)?;
        if n == 0 {
            // body ended where a header line was expected
            return Err(VecError::InvalidMultipart);
        }
        let line = trim_crlf(&buf[..n]);

        match state {
            State::Init => {
                if line.is_empty() {
                    continue;
                }
                match classify_boundary(line, boundary) {
                    BoundaryLine::Open => {
                        info.bounded = true;
                        state = State::WantRange;
                    }
                    BoundaryLine::Close => {
                        return Ok(ChunkInfo {
                            bounded: true,
                            offset: 0,
                            size: 0,
                        })
                    }
                    BoundaryLine::Other => {
                        return Err(VecError::InvalidBoundary(
                            String::from_utf8_lossy(line).into_owned(),
                        ))
                    }
                }
            }
            State::WantRange => {
                if let Some((offset, size)) = content_range_params(line)? {
                    info.offset = offset;
                    info.size = size;
                    state = State::WantBlank;
                }
            }
            State::WantBlank => {
                if line.is_empty() {
                    return Ok(info);
                }
                return Err(VecError::InvalidMultipart);
            }
        }
    }
    Err(VecError::PartHeaderTooLong)
}

/// Strip trailing `\r`/`\n` bytes.
fn trim_crlf(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

fn classify_boundary(line: &[u8], boundary: &str) -> BoundaryLine {
    if line.len() > 2 && line.starts_with(b"--") {
        let rest = &line[2..];
        if rest == boundary.as_bytes() {
            return BoundaryLine::Open;
        }
        if rest.len() == boundary.len() + 2
            && rest.starts_with(boundary.as_bytes())
            && rest.ends_with(b"--")
        {
            return BoundaryLine::Close;
        }
    }
    BoundaryLine::Other
}

/// Extract `(offset, size)` from a header line if it is `Content-Range`.
/// `Ok(None)` means a different header to be skipped; a line that is not a
/// header at all, or a `Content-Range` that does not parse, is an error.
fn content_range_params(line: &[u8]) -> Result<Option<(u64, u64)>, VecError> {
    let line = std::str::from_utf8(line).map_err(|_| VecError::InvalidMultipart)?;
    let (name, value) = line.split_once(':').ok_or(VecError::InvalidMultipart)?;
    if !name.trim().eq_ignore_ascii_case("content-range") {
        return Ok(None);
    }

    let mut tokens = value
        .split(|c: char| " bytes-/\t".contains(c))
        .filter(|t| !t.is_empty());
    let first = tokens.next().ok_or(VecError::InvalidMultipart)?;
    let second = tokens.next().ok_or(VecError::InvalidMultipart)?;
    let begin: u64 = first.parse().map_err(|_| VecError::InvalidMultipart)?;
    let end: u64 = second.parse().map_err(|_| VecError::InvalidMultipart)?;
    if end < begin {
        return Err(VecError::InvalidMultipart);
    }
    let size = (end - begin)
        .checked_add(1)
        .ok_or(VecError::InvalidMultipart)?;
    Ok(Some((begin, size)))
}
