/*!
 * Token I/O
 * Whole-token reads and writes over streaming sockets, and thread teardown
 */

use crate::core::errors::{TeleportError, TeleportResult};
use crate::core::limits::TEARDOWN_GRACE;
use std::io::{ErrorKind, Read, Write};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::warn;

/// Fill `buf` from `src`, resuming at `*filled`
///
/// Retries partial reads until the whole token is present. On error or
/// end-of-stream the partial token is discarded (`*filled` reset to 0).
pub(crate) fn read_token<R: Read>(
    src: &mut R,
    buf: &mut [u8],
    filled: &mut usize,
) -> TeleportResult<()> {
    while *filled < buf.len() {
        match src.read(&mut buf[*filled..]) {
            Ok(0) => {
                *filled = 0;
                return Err(TeleportError::Disconnected(
                    "connection closed by peer".to_string(),
                ));
            }
            Ok(n) => {
                *filled += n;
                debug_assert!(*filled <= buf.len());
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                *filled = 0;
                return Err(TeleportError::Disconnected(e.to_string()));
            }
        }
    }
    Ok(())
}

/// Write all of `token` to `dst`, retrying partial writes
pub(crate) fn write_token<W: Write>(dst: &mut W, token: &[u8]) -> TeleportResult<()> {
    let mut written = 0;
    while written < token.len() {
        match dst.write(&token[written..]) {
            Ok(0) => {
                return Err(TeleportError::WriteFailed(
                    "socket accepted zero bytes".to_string(),
                ))
            }
            Ok(n) => {
                written += n;
                debug_assert!(written <= token.len());
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(TeleportError::WriteFailed(e.to_string())),
        }
    }
    Ok(())
}

/// Join a network thread that has been told to stop
///
/// Gives the thread [`TEARDOWN_GRACE`] to notice; a thread still parked in
/// a call teardown cannot interrupt is detached instead of hanging the
/// caller.
pub(crate) fn join_or_detach(handle: JoinHandle<()>, instance: &str) {
    let deadline = Instant::now() + TEARDOWN_GRACE;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(instance = %instance, "Network thread did not stop in time; detaching it");
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    if handle.join().is_err() {
        warn!(instance = %instance, "Network thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Hands out at most one byte per read
    struct Dribble<'a> {
        data: &'a [u8],
    }

    impl Read for Dribble<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[0];
            self.data = &self.data[1..];
            Ok(1)
        }
    }

    /// Accepts at most `chunk` bytes per write, then fails after `budget` bytes
    struct Choke {
        out: Vec<u8>,
        chunk: usize,
        budget: usize,
    }

    impl Write for Choke {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "peer gone"));
            }
            let n = buf.len().min(self.chunk).min(self.budget);
            self.out.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_byte_at_a_time_reads_complete_token() {
        let mut src = Dribble {
            data: &[1, 2, 3, 4, 5, 6, 7, 8],
        };
        let mut buf = [0u8; 4];
        let mut filled = 0;

        read_token(&mut src, &mut buf, &mut filled).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(filled, 4);

        filled = 0;
        read_token(&mut src, &mut buf, &mut filled).unwrap();
        assert_eq!(buf, [5, 6, 7, 8]);
    }

    #[test]
    fn test_eof_mid_token_discards_partial() {
        let mut src = Dribble { data: &[1, 2] };
        let mut buf = [0u8; 4];
        let mut filled = 0;

        let err = read_token(&mut src, &mut buf, &mut filled).unwrap_err();
        assert!(matches!(err, TeleportError::Disconnected(_)));
        assert_eq!(filled, 0);
    }

    #[test]
    fn test_partial_writes_are_retried() {
        let mut dst = Choke {
            out: Vec::new(),
            chunk: 3,
            budget: usize::MAX,
        };
        write_token(&mut dst, &[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(dst.out, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_write_error_surfaces() {
        let mut dst = Choke {
            out: Vec::new(),
            chunk: 2,
            budget: 3,
        };
        let err = write_token(&mut dst, &[1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, TeleportError::WriteFailed(_)));
    }
}
