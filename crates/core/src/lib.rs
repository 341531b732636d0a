#![doc = include_str!("../README.md")]

pub mod format;
pub mod gamma;
pub mod params;
pub mod stream;
pub mod timing;

pub mod prelude {
    pub use crate::{
        format::{
            BayerPhase, ColorDepth, ColorFormat, FrameRate, PixelsPerClock, Resolution,
            StreamGeometry,
        },
        gamma::{GAMMA_LUT_MAX_SIZE, GAMMA_LUT_MIN_SIZE, GammaError, GammaTable},
        params::RegisterParam,
        stream::VideoStreamDescriptor,
        timing::{
            CatalogEntry, StandardCatalog, SyncPolarity, VideoModeCatalog, VideoModeId,
            VideoTiming,
        },
    };
}
