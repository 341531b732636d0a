use crate::format::{ColorDepth, ColorFormat, FrameRate, PixelsPerClock, Resolution};
use crate::timing::{VideoModeId, VideoTiming};

/// Full description of a video stream as programmed into the scaler subsystem.
///
/// Timing, frame rate and interlace flag always come from the catalog entry for
/// `mode`; they are never set independently of it.
///
/// # Example
/// ```rust
/// use vidpipe_core::prelude::*;
///
/// let catalog = StandardCatalog::new();
/// let mode = catalog.lookup_mode(1280, 720, FrameRate::new(60).unwrap()).unwrap();
/// let desc = VideoStreamDescriptor {
///     mode,
///     timing: catalog.lookup_timing(mode).unwrap(),
///     color_format: ColorFormat::Rgb,
///     color_depth: ColorDepth::Bpc8,
///     pixels_per_clock: PixelsPerClock::Two,
///     frame_rate: catalog.lookup_frame_rate(mode).unwrap(),
///     interlaced: catalog.is_interlaced(mode),
/// };
/// assert_eq!(desc.resolution().unwrap().width.get(), 1280);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoStreamDescriptor {
    pub mode: VideoModeId,
    pub timing: VideoTiming,
    pub color_format: ColorFormat,
    pub color_depth: ColorDepth,
    pub pixels_per_clock: PixelsPerClock,
    pub frame_rate: FrameRate,
    pub interlaced: bool,
}

impl VideoStreamDescriptor {
    /// Active frame size. Interlaced streams report the full frame, not a field.
    pub fn resolution(&self) -> Option<Resolution> {
        let lines = if self.interlaced {
            self.timing.v_active as u32 * 2
        } else {
            self.timing.v_active as u32
        };
        Resolution::new(self.timing.h_active as u32, lines)
    }
}
