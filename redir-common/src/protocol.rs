//! # Agent Wire Framing
//!
//! Purpose: Encode command frames and split the agent byte stream back into
//! frames without external dependencies, keeping allocations under control.
//!
//! ## Design Principles
//! 1. **Binary-Safe**: Frames are null-terminated; payloads are JSON text,
//!    so the terminator can never occur inside a frame.
//! 2. **Buffer Reuse**: Callers provide buffers to avoid per-call allocations.
//! 3. **Fail Fast**: A stream that ends mid-frame is reported as closed, not
//!    as a shorter frame.
//!
//! The client sends `NAME\0payload\0`; the agent answers `payload\0`, and
//! only for commands that expect a response.

use std::io::BufRead;

/// Byte that terminates every frame on the wire.
pub const FRAME_TERMINATOR: u8 = 0;

/// Appends a command frame (`NAME\0payload\0`) to `out`.
pub fn encode_command(name: &str, payload: &[u8], out: &mut Vec<u8>) {
    out.reserve(name.len() + payload.len() + 2);
    out.extend_from_slice(name.as_bytes());
    out.push(FRAME_TERMINATOR);
    out.extend_from_slice(payload);
    out.push(FRAME_TERMINATOR);
}

/// Reads one frame from `reader` into `buf`, stripping the terminator.
///
/// Returns `Ok(false)` when the peer closed the stream, including a close
/// in the middle of a frame. A read timeout surfaces as `Err` with
/// `ErrorKind::WouldBlock` or `ErrorKind::TimedOut` and leaves `buf` in an
/// unspecified state.
pub fn read_frame<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<bool> {
    buf.clear();
    let bytes = reader.read_until(FRAME_TERMINATOR, buf)?;
    if bytes == 0 {
        return Ok(false);
    }
    if buf.last() != Some(&FRAME_TERMINATOR) {
        return Ok(false);
    }
    buf.pop();
    Ok(true)
}
