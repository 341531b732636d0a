#![doc = include_str!("../README.md")]

pub use vidpipe_core as core;
pub use vidpipe_hal as hal;

pub mod config;
pub mod error;
pub mod metrics;
pub mod negotiate;
pub mod pipeline;
pub mod stages;

pub use thiserror;

pub mod prelude {
    pub use crate::config::{
        BlockSlot, GammaSettings, IrqSlot, PipelineConfig, StartPolicy, VideoSettings,
    };
    pub use crate::error::{BufferSide, PipelineError, Stage};
    pub use crate::metrics::BringupMetrics;
    pub use crate::negotiate::{StreamFormatNegotiator, UnsupportedVideoMode};
    pub use crate::pipeline::{Connected, PipelineHardware, PipelineState, VideoPipe};
    pub use crate::stages::{StageHandle, StageStatus};
    pub use vidpipe_hal::prelude::*;
}
