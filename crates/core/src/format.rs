use std::{fmt, num::NonZeroU32, str::FromStr};

/// Resolution of a frame.
///
/// # Example
/// ```rust
/// use vidpipe_core::prelude::Resolution;
///
/// let res = Resolution::new(1920, 1080).unwrap();
/// assert_eq!(res.width.get(), 1920);
/// assert!(Resolution::new(0, 1080).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution {
    /// Width in pixels (non-zero).
    pub width: NonZeroU32,
    /// Height in pixels (non-zero).
    pub height: NonZeroU32,
}

impl Resolution {
    /// Create a resolution, returning `None` if width or height are zero.
    pub const fn new(width: u32, height: u32) -> Option<Self> {
        match (NonZeroU32::new(width), NonZeroU32::new(height)) {
            (Some(width), Some(height)) => Some(Self { width, height }),
            _ => None,
        }
    }

    /// Total active pixels per frame.
    pub fn pixels(&self) -> u64 {
        self.width.get() as u64 * self.height.get() as u64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Integer frame rate in Hz.
///
/// Timing catalogs key their modes on whole frame rates, so fractional
/// NTSC-style rates are rounded by the caller before lookup.
///
/// # Example
/// ```rust
/// use vidpipe_core::prelude::FrameRate;
///
/// let rate = FrameRate::new(30).unwrap();
/// assert_eq!(rate.hz(), 30);
/// assert_eq!(rate.to_string(), "30Hz");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FrameRate(NonZeroU32);

impl FrameRate {
    /// Construct from Hz, returning `None` for zero.
    pub const fn new(hz: u32) -> Option<Self> {
        match NonZeroU32::new(hz) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Frames per second.
    pub const fn hz(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.0)
    }
}

/// Frame geometry together with its rate: the key used for timing lookups.
///
/// # Example
/// ```rust
/// use vidpipe_core::prelude::StreamGeometry;
///
/// let geo: StreamGeometry = "1280x720@60".parse().unwrap();
/// assert_eq!(geo.resolution.height.get(), 720);
/// assert_eq!(geo.rate.hz(), 60);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamGeometry {
    pub resolution: Resolution,
    pub rate: FrameRate,
}

impl StreamGeometry {
    /// Build from raw integers, returning `None` if any value is zero.
    pub const fn new(width: u32, height: u32, hz: u32) -> Option<Self> {
        match (Resolution::new(width, height), FrameRate::new(hz)) {
            (Some(resolution), Some(rate)) => Some(Self { resolution, rate }),
            _ => None,
        }
    }

    pub fn width(&self) -> u32 {
        self.resolution.width.get()
    }

    pub fn height(&self) -> u32 {
        self.resolution.height.get()
    }
}

impl fmt::Display for StreamGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.resolution, self.rate.hz())
    }
}

impl FromStr for StreamGeometry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dims, rate) = s
            .split_once('@')
            .ok_or_else(|| "geometry must look like WIDTHxHEIGHT@HZ".to_string())?;
        let (w, h) = dims
            .split_once('x')
            .ok_or_else(|| "geometry must look like WIDTHxHEIGHT@HZ".to_string())?;
        let parse = |v: &str| v.trim().parse::<u32>().map_err(|e| e.to_string());
        StreamGeometry::new(parse(w)?, parse(h)?, parse(rate)?)
            .ok_or_else(|| "geometry values must be non-zero".to_string())
    }
}

/// Color format id carried by a video stream.
///
/// Discriminants match the register encoding used by the scaler and gamma blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ColorFormat {
    #[default]
    Rgb = 0,
    Yuv444 = 1,
    Yuv422 = 2,
    Yuv420 = 3,
}

impl ColorFormat {
    /// Register value for this format.
    pub const fn id(self) -> u32 {
        self as u32
    }
}

/// Bits per color component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorDepth {
    #[default]
    Bpc8,
    Bpc10,
    Bpc12,
    Bpc16,
}

impl ColorDepth {
    pub const fn bits(self) -> u8 {
        match self {
            ColorDepth::Bpc8 => 8,
            ColorDepth::Bpc10 => 10,
            ColorDepth::Bpc12 => 12,
            ColorDepth::Bpc16 => 16,
        }
    }

    /// Map a raw bit count reported by hardware config.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(ColorDepth::Bpc8),
            10 => Some(ColorDepth::Bpc10),
            12 => Some(ColorDepth::Bpc12),
            16 => Some(ColorDepth::Bpc16),
            _ => None,
        }
    }
}

/// Pixels processed per clock cycle by the streaming fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelsPerClock {
    One,
    #[default]
    Two,
    Four,
    Eight,
}

impl PixelsPerClock {
    pub const fn count(self) -> u8 {
        match self {
            PixelsPerClock::One => 1,
            PixelsPerClock::Two => 2,
            PixelsPerClock::Four => 4,
            PixelsPerClock::Eight => 8,
        }
    }

    pub const fn from_count(count: u8) -> Option<Self> {
        match count {
            1 => Some(PixelsPerClock::One),
            2 => Some(PixelsPerClock::Two),
            4 => Some(PixelsPerClock::Four),
            8 => Some(PixelsPerClock::Eight),
            _ => None,
        }
    }
}

/// Color-filter arrangement of a raw sensor, as seen from the top-left pixel.
///
/// Discriminants are the demosaic block's `bayer_phase` register encoding.
///
/// # Example
/// ```rust
/// use vidpipe_core::prelude::BayerPhase;
///
/// assert_eq!(BayerPhase::Bggr.register_value(), 3);
/// assert_eq!(BayerPhase::from_register(1), Some(BayerPhase::Grbg));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum BayerPhase {
    Rggb = 0,
    Grbg = 1,
    Gbrg = 2,
    Bggr = 3,
}

impl BayerPhase {
    pub const fn register_value(self) -> u32 {
        self as u32
    }

    pub const fn from_register(value: u32) -> Option<Self> {
        match value {
            0 => Some(BayerPhase::Rggb),
            1 => Some(BayerPhase::Grbg),
            2 => Some(BayerPhase::Gbrg),
            3 => Some(BayerPhase::Bggr),
            _ => None,
        }
    }
}

impl fmt::Display for BayerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BayerPhase::Rggb => "RGGB",
            BayerPhase::Grbg => "GRBG",
            BayerPhase::Gbrg => "GBRG",
            BayerPhase::Bggr => "BGGR",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_parse_rejects_malformed() {
        assert!("1920x1080".parse::<StreamGeometry>().is_err());
        assert!("1920-1080@30".parse::<StreamGeometry>().is_err());
        assert!("0x1080@30".parse::<StreamGeometry>().is_err());
        assert!("1920x1080@0".parse::<StreamGeometry>().is_err());
    }

    #[test]
    fn geometry_display_round_trips_through_parse() {
        let geo = StreamGeometry::new(3840, 2160, 30).unwrap();
        assert_eq!(geo.to_string(), "3840x2160@30");
        assert_eq!(geo.to_string().parse::<StreamGeometry>().unwrap(), geo);
    }

    #[test]
    fn depth_and_ppc_reject_unknown_counts() {
        assert_eq!(ColorDepth::from_bits(10), Some(ColorDepth::Bpc10));
        assert_eq!(ColorDepth::from_bits(9), None);
        assert_eq!(PixelsPerClock::from_count(4), Some(PixelsPerClock::Four));
        assert_eq!(PixelsPerClock::from_count(3), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn frame_rate_serializes_as_plain_integer() {
        let rate = FrameRate::new(60).unwrap();
        assert_eq!(serde_json::to_string(&rate).unwrap(), "60");
        let back: FrameRate = serde_json::from_str("25").unwrap();
        assert_eq!(back.hz(), 25);
    }
}
