//! Stream framing for the device protocol
//!
//! TCP delivers device data in arbitrary chunks. [`FrameCodec`] accumulates bytes, finds
//! the next start marker, waits until the declared length is buffered and validates the
//! checksum before yielding a [`RawFrame`]. Anything malformed is skipped one byte at a
//! time until the next plausible start marker, so a corrupt frame never ends the stream.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace, warn};

use super::{
    ACK_LEN, DEFAULT_MAX_FRAME_LEN, LENGTH_BASE, is_start_marker, min_body_len,
};
use crate::{FramingError, IngestError};

/// Frame trailer handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// Last frame byte is the XOR of every preceding byte.
    #[default]
    Xor,
    /// Frames carry no trailer.
    None,
}

impl ChecksumMode {
    /// Bytes the trailer occupies at the end of a frame.
    pub fn trailer_len(self) -> usize {
        match self {
            ChecksumMode::Xor => 1,
            ChecksumMode::None => 0,
        }
    }
}

/// XOR of every byte, as used by the frame trailer.
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Framing limits for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingOptions {
    pub checksum: ChecksumMode,
    /// Declared frames longer than this are treated as corrupt.
    pub max_frame_len: usize,
}

impl Default for FramingOptions {
    fn default() -> Self {
        Self { checksum: ChecksumMode::Xor, max_frame_len: DEFAULT_MAX_FRAME_LEN }
    }
}

/// Counters for what the codec accepted and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramingStats {
    pub frames: u64,
    pub discarded_bytes: u64,
    pub checksum_failures: u64,
    pub oversized: u64,
    pub undersized: u64,
}

/// One complete, checksum-validated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Bytes,
    trailer_len: usize,
}

impl RawFrame {
    /// Wrap a frame that carries no checksum trailer, such as a captured payload.
    pub fn without_trailer(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into(), trailer_len: 0 }
    }

    /// Frame bytes including any trailer.
    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Frame bytes the decoder reads, trailer excluded.
    pub fn body(&self) -> Bytes {
        self.bytes.slice(..self.bytes.len() - self.trailer_len)
    }

    /// Header discriminator byte.
    pub fn header(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    /// Length of the checksum trailer that followed the body on the wire.
    pub fn trailer_len(&self) -> usize {
        self.trailer_len
    }

    /// Acknowledgment echoing this frame's prefix.
    pub fn acknowledgment(&self) -> Acknowledgment {
        Acknowledgment(self.bytes.slice(..ACK_LEN.min(self.bytes.len())))
    }
}

/// Bytes written back to a device after one of its frames is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment(pub Bytes);

/// Codec producing [`RawFrame`]s from a device byte stream.
#[derive(Debug, Default)]
pub struct FrameCodec {
    options: FramingOptions,
    stats: FramingStats,
}

impl FrameCodec {
    pub fn new(options: FramingOptions) -> Self {
        Self { options, stats: FramingStats::default() }
    }

    pub fn stats(&self) -> FramingStats {
        self.stats
    }

    fn discard(&mut self, src: &mut BytesMut, count: usize) {
        src.advance(count);
        self.stats.discarded_bytes += count as u64;
    }

    fn reject(&mut self, src: &mut BytesMut, error: FramingError) {
        match error {
            FramingError::Oversized { .. } => self.stats.oversized += 1,
            FramingError::Undersized { .. } => self.stats.undersized += 1,
            FramingError::ChecksumMismatch { .. } => self.stats.checksum_failures += 1,
        }
        warn!(%error, "Discarding frame, resynchronizing");
        // Drop only the start marker; the next frame may begin inside the rejected span.
        self.discard(src, 1);
    }

    /// Validate the frame at the front of `src`. `Ok(None)` means more bytes are needed.
    fn check_candidate(&self, src: &BytesMut) -> Result<Option<usize>, FramingError> {
        if src.len() < 3 {
            return Ok(None);
        }

        let declared = usize::from(u16::from_be_bytes([src[1], src[2]]));
        let total = LENGTH_BASE + declared;
        if total > self.options.max_frame_len {
            return Err(FramingError::Oversized { declared: total, max: self.options.max_frame_len });
        }

        let trailer = self.options.checksum.trailer_len();
        let min = min_body_len(src[0]).unwrap_or(LENGTH_BASE) + trailer;
        if total < min {
            return Err(FramingError::Undersized { declared: total, min });
        }

        if src.len() < total {
            return Ok(None);
        }

        if self.options.checksum == ChecksumMode::Xor {
            let computed = xor_checksum(&src[..total - 1]);
            let found = src[total - 1];
            if computed != found {
                return Err(FramingError::ChecksumMismatch { computed, found });
            }
        }

        Ok(Some(total))
    }
}

impl Decoder for FrameCodec {
    type Item = RawFrame;
    type Error = IngestError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match src.iter().position(|b| is_start_marker(*b)) {
                Some(0) => {}
                Some(skip) => {
                    debug!(skipped = skip, "Skipping bytes before start marker");
                    self.discard(src, skip);
                }
                None => {
                    if !src.is_empty() {
                        debug!(skipped = src.len(), "No start marker in buffer");
                        let len = src.len();
                        self.discard(src, len);
                    }
                    return Ok(None);
                }
            }

            match self.check_candidate(src) {
                Ok(Some(total)) => {
                    let bytes = src.split_to(total).freeze();
                    self.stats.frames += 1;
                    trace!(len = total, header = bytes[0], "Frame complete");
                    return Ok(Some(RawFrame {
                        bytes,
                        trailer_len: self.options.checksum.trailer_len(),
                    }));
                }
                Ok(None) => {
                    if src.len() >= 3 {
                        let declared = usize::from(u16::from_be_bytes([src[1], src[2]]));
                        src.reserve(LENGTH_BASE + declared - src.len());
                    }
                    return Ok(None);
                }
                Err(error) => self.reject(src, error),
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if !buf.is_empty() {
                    debug!(remaining = buf.len(), "Stream ended inside a partial frame");
                    let len = buf.len();
                    self.discard(buf, len);
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Acknowledgment> for FrameCodec {
    type Error = IngestError;

    fn encode(&mut self, item: Acknowledgment, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item.0);
        Ok(())
    }
}
