//! Derivation of full video stream descriptors from requested geometry.
use vidpipe_core::prelude::*;

/// The timing catalog has no mode for the requested geometry/rate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no video mode for {geometry}")]
pub struct UnsupportedVideoMode {
    pub geometry: StreamGeometry,
}

/// Builds [`VideoStreamDescriptor`]s by resolving a mode id and reading everything
/// timing-related back from the catalog entry for that id.
///
/// # Example
/// ```rust
/// use vidpipe::prelude::*;
///
/// let catalog = StandardCatalog::new();
/// let negotiator = StreamFormatNegotiator::new(&catalog);
/// let geometry = StreamGeometry::new(1920, 1080, 30).unwrap();
/// let desc = negotiator
///     .derive(geometry, ColorFormat::Rgb, ColorDepth::Bpc8, PixelsPerClock::Two)
///     .unwrap();
/// assert_eq!(desc.timing.h_total, 2200);
/// assert!(!desc.interlaced);
///
/// let odd = StreamGeometry::new(1000, 700, 30).unwrap();
/// assert!(negotiator
///     .derive(odd, ColorFormat::Rgb, ColorDepth::Bpc8, PixelsPerClock::Two)
///     .is_err());
/// ```
pub struct StreamFormatNegotiator<'a> {
    catalog: &'a dyn VideoModeCatalog,
}

impl<'a> StreamFormatNegotiator<'a> {
    pub fn new(catalog: &'a dyn VideoModeCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve `geometry` to a catalog mode and assemble its descriptor.
    ///
    /// Nothing is returned unless the mode id, its timing and its frame rate all resolve.
    pub fn derive(
        &self,
        geometry: StreamGeometry,
        color_format: ColorFormat,
        color_depth: ColorDepth,
        pixels_per_clock: PixelsPerClock,
    ) -> Result<VideoStreamDescriptor, UnsupportedVideoMode> {
        let unsupported = || UnsupportedVideoMode { geometry };
        let mode = self
            .catalog
            .lookup_mode(geometry.width(), geometry.height(), geometry.rate)
            .ok_or_else(unsupported)?;
        let timing = self.catalog.lookup_timing(mode).ok_or_else(unsupported)?;
        let frame_rate = self
            .catalog
            .lookup_frame_rate(mode)
            .ok_or_else(unsupported)?;
        Ok(VideoStreamDescriptor {
            mode,
            timing,
            color_format,
            color_depth,
            pixels_per_clock,
            frame_rate,
            interlaced: self.catalog.is_interlaced(mode),
        })
    }
}
