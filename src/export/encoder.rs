use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom};

use crate::error::{ExportError, ExportResult};

/// The byte every well-formed GIF stream ends with
const GIF_TRAILER: u8 = 0x3B;

/// Sink for rendered frames. `close` must be called on every exit path,
/// including after a failed `encode_frame`.
pub trait FrameEncoder {
    fn encode_frame(&mut self, frame: RgbaImage, duration_ms: u64) -> ExportResult<()>;

    /// Finish the stream. Calling it more than once is a no-op.
    fn close(&mut self) -> ExportResult<()>;
}

/// Animated GIF writer over a file the caller owns
pub struct GifFileEncoder {
    encoder: Option<GifEncoder<BufWriter<File>>>,
    /// Second handle on the same file, used to verify the stream on close
    file: File,
    width: u32,
    height: u32,
    frames: usize,
}

impl std::fmt::Debug for GifFileEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GifFileEncoder")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frames", &self.frames)
            .field("open", &self.encoder.is_some())
            .finish()
    }
}

impl GifFileEncoder {
    /// Start a GIF stream of `width`x`height` frames into `file`.
    ///
    /// `speed` trades palette quality for encoding time, 1 to 30.
    pub fn create(
        file: File,
        width: u32,
        height: u32,
        speed: i32,
        repeat_forever: bool,
    ) -> ExportResult<Self> {
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(ExportError::InvalidDimensions { width, height });
        }
        let verify = file.try_clone()?;
        let mut encoder = GifEncoder::new_with_speed(BufWriter::new(file), speed.clamp(1, 30));
        if repeat_forever {
            encoder.set_repeat(Repeat::Infinite)?;
        }
        Ok(Self {
            encoder: Some(encoder),
            file: verify,
            width,
            height,
            frames: 0,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Checks that the finished file carries a complete GIF stream
    fn verify(&mut self) -> ExportResult<()> {
        self.file.sync_all()?;
        let len = self.file.metadata()?.len();
        if len == 0 {
            return Err(truncated("empty GIF stream"));
        }
        self.file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        self.file.read_exact(&mut last)?;
        if last[0] != GIF_TRAILER {
            return Err(truncated("GIF stream is missing its trailer"));
        }
        Ok(())
    }
}

fn truncated(reason: &str) -> ExportError {
    ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, reason.to_string()))
}

impl FrameEncoder for GifFileEncoder {
    fn encode_frame(&mut self, frame: RgbaImage, duration_ms: u64) -> ExportResult<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(ExportError::Surface("encoder already closed".to_string()));
        };
        if frame.dimensions() != (self.width, self.height) {
            return Err(ExportError::Surface(format!(
                "frame is {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let delay = Delay::from_numer_denom_ms(duration_ms.min(u32::MAX as u64) as u32, 1);
        encoder.encode_frame(Frame::from_parts(frame, 0, 0, delay))?;
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> ExportResult<()> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        // dropping the encoder writes the trailer and flushes the buffer
        drop(encoder);
        log::debug!("Closed GIF stream after {} frames", self.frames);
        if self.frames == 0 {
            return Err(truncated("no frames were encoded"));
        }
        self.verify()
    }
}

impl Drop for GifFileEncoder {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            log::warn!("GIF encoder dropped without close()");
        }
    }
}
