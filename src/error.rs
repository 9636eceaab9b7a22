//! Error kinds raised by the vector read core.

use std::fmt;

/// Error returned by a vectored read (multipart framing violation, bad HTTP
/// status, or a transport failure from the HTTP layer).
/// Kept structured so callers can tell a broken server from a broken network.
#[derive(Debug)]
pub enum VecError {
    /// Multipart framing was malformed: missing blank line, garbage where a
    /// header was expected, or a truncated part.
    InvalidMultipart,
    /// A part header ran past the line cap without reaching its blank line.
    PartHeaderTooLong,
    /// A part opened with a boundary line that does not match the boundary
    /// announced in `Content-Type`.
    InvalidBoundary(String),
    /// A part's `Content-Range` disagrees with the range that was requested.
    RangeMismatch {
        req_offset: u64,
        req_size: u64,
        part_offset: u64,
        part_size: u64,
    },
    /// The body ended before the announced part size was read.
    PartialBody { expected: u64, received: u64 },
    /// HTTP status outside {200, 206}.
    Http(u32),
    /// Curl reported a transport error.
    Curl(curl::Error),
    /// IO failure from the HTTP layer.
    Io(std::io::Error),
    /// Other transport-level failure (e.g. from the curl multi interface).
    Transport(String),
}

impl fmt::Display for VecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VecError::InvalidMultipart => write!(f, "invalid multipart response"),
            VecError::PartHeaderTooLong => write!(f, "multipart part header too long"),
            VecError::InvalidBoundary(line) => {
                write!(f, "invalid boundary for multipart response: {}", line)
            }
            VecError::RangeMismatch {
                req_offset,
                req_size,
                part_offset,
                part_size,
            } => write!(
                f,
                "invalid multipart part: requested offset {} size {}, part reports offset {} size {}",
                req_offset, req_size, part_offset, part_size
            ),
            VecError::PartialBody { expected, received } => {
                write!(f, "partial body: expected {} bytes, got {}", expected, received)
            }
            VecError::Http(code) => write!(f, "HTTP {}", code),
            VecError::Curl(e) => write!(f, "{}", e),
            VecError::Io(e) => write!(f, "io: {}", e),
            VecError::Transport(msg) => write!(f, "transport: {}", msg),
        }
    }
}

impl std::error::Error for VecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VecError::Curl(e) => Some(e),
            VecError::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_mismatch_names_both_sides() {
        let e = VecError::RangeMismatch {
            req_offset: 10,
            req_size: 4,
            part_offset: 15,
            part_size: 4,
        };
        let msg = e.to_string();
        assert!(msg.contains("offset 10 size 4"));
        assert!(msg.contains("offset 15 size 4"));
    }

    #[test]
    fn partial_body_reports_counts() {
        let e = VecError::PartialBody {
            expected: 100,
            received: 60,
        };
        assert_eq!(e.to_string(), "partial body: expected 100 bytes, got 60");
    }
}
