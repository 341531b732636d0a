//! Video timing descriptors and the mode catalog seam.
//!
//! A [`VideoModeCatalog`] resolves `(width, height, rate)` into a canonical mode id and
//! answers timing/rate/interlace queries for that id. [`StandardCatalog`] ships the
//! CEA-861 and VESA modes the pipeline is normally run at.
use std::fmt;

use crate::format::FrameRate;

/// Canonical video mode identifier issued by a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct VideoModeId(pub u16);

impl fmt::Display for VideoModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vm#{}", self.0)
    }
}

/// Sync pulse polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SyncPolarity {
    Negative,
    Positive,
}

/// Horizontal and vertical timing of a video mode.
///
/// For interlaced modes the vertical figures describe a single field.
///
/// # Example
/// ```rust
/// use vidpipe_core::prelude::{SyncPolarity, VideoTiming};
///
/// let t = VideoTiming::new(
///     (1920, 88, 44, 148, SyncPolarity::Positive),
///     (1080, 4, 5, 36, SyncPolarity::Positive),
/// );
/// assert_eq!(t.h_total, 2200);
/// assert_eq!(t.v_total, 1125);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoTiming {
    pub h_active: u16,
    pub h_front_porch: u16,
    pub h_sync_width: u16,
    pub h_back_porch: u16,
    pub h_total: u16,
    pub h_sync_polarity: SyncPolarity,
    pub v_active: u16,
    pub v_front_porch: u16,
    pub v_sync_width: u16,
    pub v_back_porch: u16,
    pub v_total: u16,
    pub v_sync_polarity: SyncPolarity,
}

impl VideoTiming {
    /// Build from `(active, front porch, sync, back porch, polarity)` tuples; totals are summed.
    pub const fn new(
        h: (u16, u16, u16, u16, SyncPolarity),
        v: (u16, u16, u16, u16, SyncPolarity),
    ) -> Self {
        Self {
            h_active: h.0,
            h_front_porch: h.1,
            h_sync_width: h.2,
            h_back_porch: h.3,
            h_total: h.0 + h.1 + h.2 + h.3,
            h_sync_polarity: h.4,
            v_active: v.0,
            v_front_porch: v.1,
            v_sync_width: v.2,
            v_back_porch: v.3,
            v_total: v.0 + v.1 + v.2 + v.3,
            v_sync_polarity: v.4,
        }
    }

    /// Pixel clock in Hz needed to drive this timing at `rate`.
    pub fn pixel_clock_hz(&self, rate: FrameRate) -> u64 {
        self.h_total as u64 * self.v_total as u64 * rate.hz() as u64
    }
}

/// Catalog of standard video modes.
///
/// Lookups by geometry only ever resolve progressive modes; interlaced entries are
/// reachable through their id.
pub trait VideoModeCatalog {
    /// Canonical progressive mode id for the geometry/rate, if the catalog has one.
    fn lookup_mode(&self, width: u32, height: u32, rate: FrameRate) -> Option<VideoModeId>;

    /// Timing for a mode id.
    fn lookup_timing(&self, mode: VideoModeId) -> Option<VideoTiming>;

    /// Nominal frame rate for a mode id.
    fn lookup_frame_rate(&self, mode: VideoModeId) -> Option<FrameRate>;

    /// Whether the mode is interlaced. Unknown ids report `false`.
    fn is_interlaced(&self, mode: VideoModeId) -> bool;
}

/// A single row of the standard catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: VideoModeId,
    pub name: &'static str,
    pub rate: FrameRate,
    pub interlaced: bool,
    pub timing: VideoTiming,
}

const fn hz(v: u32) -> FrameRate {
    match FrameRate::new(v) {
        Some(r) => r,
        None => panic!("catalog rates are non-zero"),
    }
}

const fn entry(
    id: u16,
    name: &'static str,
    rate: u32,
    interlaced: bool,
    timing: VideoTiming,
) -> CatalogEntry {
    CatalogEntry {
        id: VideoModeId(id),
        name,
        rate: hz(rate),
        interlaced,
        timing,
    }
}

use SyncPolarity::{Negative as N, Positive as P};

#[rustfmt::skip]
const STANDARD_MODES: &[CatalogEntry] = &[
    entry(1, "640x480@60", 60, false,
        VideoTiming::new((640, 16, 96, 48, N), (480, 10, 2, 33, N))),
    entry(2, "800x600@60", 60, false,
        VideoTiming::new((800, 40, 128, 88, P), (600, 1, 4, 23, P))),
    entry(3, "1280x720@30", 30, false,
        VideoTiming::new((1280, 1760, 40, 220, P), (720, 5, 5, 20, P))),
    entry(4, "1280x720@60", 60, false,
        VideoTiming::new((1280, 110, 40, 220, P), (720, 5, 5, 20, P))),
    entry(5, "1920x1080@24", 24, false,
        VideoTiming::new((1920, 638, 44, 148, P), (1080, 4, 5, 36, P))),
    entry(6, "1920x1080@25", 25, false,
        VideoTiming::new((1920, 528, 44, 148, P), (1080, 4, 5, 36, P))),
    entry(7, "1920x1080@30", 30, false,
        VideoTiming::new((1920, 88, 44, 148, P), (1080, 4, 5, 36, P))),
    entry(8, "1920x1080@50", 50, false,
        VideoTiming::new((1920, 528, 44, 148, P), (1080, 4, 5, 36, P))),
    entry(9, "1920x1080@60", 60, false,
        VideoTiming::new((1920, 88, 44, 148, P), (1080, 4, 5, 36, P))),
    entry(10, "1920x1080i@60", 60, true,
        VideoTiming::new((1920, 88, 44, 148, P), (540, 2, 5, 15, P))),
    entry(11, "3840x2160@30", 30, false,
        VideoTiming::new((3840, 176, 88, 296, P), (2160, 8, 10, 72, P))),
];

/// Built-in catalog of common CEA-861/VESA modes.
///
/// # Example
/// ```rust
/// use vidpipe_core::prelude::*;
///
/// let catalog = StandardCatalog::new();
/// let id = catalog
///     .lookup_mode(1920, 1080, FrameRate::new(30).unwrap())
///     .expect("1080p30");
/// assert_eq!(catalog.lookup_timing(id).unwrap().h_total, 2200);
/// assert!(!catalog.is_interlaced(id));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCatalog;

impl StandardCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Every mode the catalog knows.
    pub fn entries(&self) -> &'static [CatalogEntry] {
        STANDARD_MODES
    }

    /// Catalog row for an id.
    pub fn entry(&self, mode: VideoModeId) -> Option<&'static CatalogEntry> {
        STANDARD_MODES.iter().find(|e| e.id == mode)
    }
}

impl VideoModeCatalog for StandardCatalog {
    fn lookup_mode(&self, width: u32, height: u32, rate: FrameRate) -> Option<VideoModeId> {
        STANDARD_MODES
            .iter()
            .find(|e| {
                !e.interlaced
                    && e.timing.h_active as u32 == width
                    && e.timing.v_active as u32 == height
                    && e.rate == rate
            })
            .map(|e| e.id)
    }

    fn lookup_timing(&self, mode: VideoModeId) -> Option<VideoTiming> {
        self.entry(mode).map(|e| e.timing)
    }

    fn lookup_frame_rate(&self, mode: VideoModeId) -> Option<FrameRate> {
        self.entry(mode).map(|e| e.rate)
    }

    fn is_interlaced(&self, mode: VideoModeId) -> bool {
        self.entry(mode).map(|e| e.interlaced).unwrap_or(false)
    }
}
