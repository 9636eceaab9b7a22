//! The HTTP capability the vector read core consumes.
//!
//! The core never opens connections itself: it drives one GET at a time
//! through [`HttpRequest`] and obtains them from an [`HttpClient`]. Tests
//! drive the core with an in-memory implementation; production uses the
//! curl-backed one in [`crate::backend`].

use std::collections::HashMap;
use std::time::Duration;

use crate::error::VecError;

/// Parameters applied to every request issued for one vector read:
/// custom headers plus transport timeouts.
#[derive(Debug, Clone)]
pub struct RequestParams {
    /// Extra request headers, e.g. auth tokens from a resolver.
    pub custom_headers: HashMap<String, String>,
    pub connect_timeout: Duration,
    /// Hard wall-clock cap for one transfer.
    pub timeout: Duration,
    /// Abort a transfer whose throughput stays below this many bytes per
    /// second for `low_speed_time`. Catches stalled connections long before
    /// the wall-clock timeout does.
    pub low_speed_limit_bytes: u32,
    pub low_speed_time: Duration,
    pub max_redirections: u32,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            custom_headers: HashMap::new(),
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(3600),
            low_speed_limit_bytes: 1024,
            low_speed_time: Duration::from_secs(60),
            max_redirections: 10,
        }
    }
}

/// One in-flight HTTP GET.
///
/// The response body is consumed as a byte stream through the read methods;
/// `end` releases the transfer (dropping the request must release it too,
/// so every exit path closes the connection).
pub trait HttpRequest {
    /// Perform the request up to the response headers. Status, size and
    /// headers are available afterwards.
    fn begin(&mut self) -> Result<(), VecError>;

    /// HTTP status code of the response.
    fn status(&self) -> u32;

    /// `Content-Length`, or `None` when the server did not send one.
    fn answer_size(&self) -> Option<u64>;

    /// A response header value looked up by case-insensitive name.
    fn answer_header(&self, name: &str) -> Option<String>;

    /// Read up to `buf.len()` body bytes; returns 0 at end of body.
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, VecError>;

    /// Read one line including its trailing newline. Returns the number of
    /// bytes placed in `buf`, 0 at end of body. The default pulls single
    /// bytes through `read_block`, which is fine for buffered
    /// implementations.
    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, VecError> {
        let mut n = 0;
        while n < buf.len() {
            let mut byte = [0u8; 1];
            if self.read_block(&mut byte)? == 0 {
                break;
            }
            buf[n] = byte[0];
            n += 1;
            if byte[0] == b'\n' {
                break;
            }
        }
        Ok(n)
    }

    /// Read exactly `buf.len()` bytes, failing with
    /// [`VecError::PartialBody`] when the body ends early.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), VecError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_block(&mut buf[filled..])?;
            if n == 0 {
                return Err(VecError::PartialBody {
                    expected: buf.len() as u64,
                    received: filled as u64,
                });
            }
            filled += n;
        }
        Ok(())
    }

    /// Release the transfer. Remaining body bytes may be discarded.
    fn end(&mut self) -> Result<(), VecError>;
}

/// Issues GET requests against one resource.
pub trait HttpClient {
    type Request: HttpRequest;

    /// Build a GET for `url` carrying `params` plus `extra_headers`
    /// (e.g. `Range`). The request is not performed until `begin`.
    fn get(
        &self,
        url: &str,
        params: &RequestParams,
        extra_headers: &[(String, String)],
    ) -> Result<Self::Request, VecError>;
}
