use vidpipe_core::prelude::*;
use vidpipe_hal::{DeviceId, IrqBinding, IrqControllerId};

use crate::error::PipelineError;

/// Byte offsets of the red, green and blue LUT windows inside the gamma block.
pub const GAMMA_CHANNEL_OFFSETS: [u32; 3] = [0x800, 0x1000, 0x1800];
/// 16-bit words that fit in one channel window.
pub const GAMMA_CHANNEL_WORDS: usize = 0x800 / 2;

/// Default frame geometry on both sides of the scaler.
pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
pub const DEFAULT_FRAME_RATE: u32 = 30;
const DEFAULT_GEOMETRY: StreamGeometry =
    match StreamGeometry::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, DEFAULT_FRAME_RATE) {
        Some(geometry) => geometry,
        None => panic!("default geometry must be non-zero"),
    };
/// Default tone curve exponent.
pub const DEFAULT_GAMMA: f64 = 0.5;
/// Default gamma LUT size (entries per channel).
pub const DEFAULT_GAMMA_LUT_SIZE: usize = GAMMA_CHANNEL_WORDS;

/// Register-mapped block without an interrupt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockSlot {
    pub device: DeviceId,
    pub base_address: u64,
}

/// Register-mapped block that raises interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IrqSlot {
    pub device: DeviceId,
    pub base_address: u64,
    pub vector: u16,
}

impl IrqSlot {
    /// Binding of this slot's vector on `controller`.
    pub fn irq(&self, controller: IrqControllerId) -> IrqBinding {
        IrqBinding {
            controller,
            vector: self.vector,
        }
    }
}

/// Whether `start()` insists on the sensor acknowledging the stream start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StartPolicy {
    /// Log a sensor `configure` failure and carry on to the DMA start.
    #[default]
    BestEffort,
    /// Abort `start()` if the sensor rejects `configure`.
    Strict,
}

/// Tone curve parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GammaSettings {
    pub exponent: f64,
    pub lut_size: usize,
}

impl Default for GammaSettings {
    fn default() -> Self {
        Self {
            exponent: DEFAULT_GAMMA,
            lut_size: DEFAULT_GAMMA_LUT_SIZE,
        }
    }
}

/// Stream-level settings for a bring-up run.
///
/// # Example
/// ```rust
/// use vidpipe::prelude::*;
///
/// let video = VideoSettings::new()
///     .input(StreamGeometry::new(1280, 720, 60).unwrap())
///     .output(StreamGeometry::new(1920, 1080, 60).unwrap())
///     .gamma(0.45, 256)
///     .start_policy(StartPolicy::Strict);
/// assert_eq!(video.gamma.lut_size, 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VideoSettings {
    /// Geometry the sensor streams and the demosaic/gamma blocks process.
    pub input: StreamGeometry,
    /// Geometry the scaler produces.
    pub output: StreamGeometry,
    pub color_format: ColorFormat,
    pub gamma: GammaSettings,
    pub start_policy: StartPolicy,
}

impl VideoSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, geometry: StreamGeometry) -> Self {
        self.input = geometry;
        self
    }

    pub fn output(mut self, geometry: StreamGeometry) -> Self {
        self.output = geometry;
        self
    }

    pub fn color_format(mut self, format: ColorFormat) -> Self {
        self.color_format = format;
        self
    }

    pub fn gamma(mut self, exponent: f64, lut_size: usize) -> Self {
        self.gamma = GammaSettings { exponent, lut_size };
        self
    }

    pub fn start_policy(mut self, policy: StartPolicy) -> Self {
        self.start_policy = policy;
        self
    }

    /// Snap the LUT size to a power of two that fits one channel window.
    pub fn sanitized(self) -> Self {
        let lut_size = self
            .gamma
            .lut_size
            .clamp(GAMMA_LUT_MIN_SIZE, GAMMA_CHANNEL_WORDS)
            .next_power_of_two()
            .min(GAMMA_CHANNEL_WORDS);
        Self {
            gamma: GammaSettings {
                lut_size,
                ..self.gamma
            },
            ..self
        }
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            input: DEFAULT_GEOMETRY,
            output: DEFAULT_GEOMETRY,
            color_format: ColorFormat::Rgb,
            gamma: GammaSettings::default(),
            start_policy: StartPolicy::default(),
        }
    }
}

/// Device ids, interrupt vectors and base addresses of every block, plus stream settings.
///
/// Supplied once when the pipeline is built.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    pub interrupt_controller: IrqControllerId,
    pub power: BlockSlot,
    pub transport: IrqSlot,
    pub frame_buffer_write: IrqSlot,
    pub frame_buffer_read: IrqSlot,
    /// Memory region shared by the write and read engines.
    pub frame_buffer_region: u64,
    pub demosaic: BlockSlot,
    pub gamma: BlockSlot,
    pub scaler: DeviceId,
    pub video: VideoSettings,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video(mut self, video: VideoSettings) -> Self {
        self.video = video;
        self
    }

    /// Check everything that can be rejected without touching hardware.
    ///
    /// The LUT size is checked as given; run [`VideoSettings::sanitized`] first to snap it.
    pub fn validate(&self) -> Result<(), PipelineError> {
        vidpipe_core::gamma::validate_exponent(self.video.gamma.exponent)
            .and_then(|_| vidpipe_core::gamma::validate_size(self.video.gamma.lut_size))
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        if self.video.gamma.lut_size > GAMMA_CHANNEL_WORDS {
            return Err(PipelineError::InvalidConfig(format!(
                "gamma LUT of {} entries overflows a {GAMMA_CHANNEL_WORDS}-word channel window",
                self.video.gamma.lut_size
            )));
        }
        if self.frame_buffer_region == 0 {
            return Err(PipelineError::InvalidConfig(
                "frame buffer region base address is zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interrupt_controller: IrqControllerId(0),
            power: BlockSlot {
                device: DeviceId(0),
                base_address: 0xA000_0000,
            },
            transport: IrqSlot {
                device: DeviceId(0),
                base_address: 0xA001_0000,
                vector: 121,
            },
            frame_buffer_write: IrqSlot {
                device: DeviceId(0),
                base_address: 0xA002_0000,
                vector: 122,
            },
            frame_buffer_read: IrqSlot {
                device: DeviceId(0),
                base_address: 0xA003_0000,
                vector: 123,
            },
            frame_buffer_region: 0x1000_0000,
            demosaic: BlockSlot {
                device: DeviceId(0),
                base_address: 0xA005_0000,
            },
            gamma: BlockSlot {
                device: DeviceId(0),
                base_address: 0xA006_0000,
            },
            scaler: DeviceId(0),
            video: VideoSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.video.input.to_string(), "1920x1080@30");
        assert_eq!(cfg.video.gamma.lut_size, 1024);
        assert_eq!(cfg.video.start_policy, StartPolicy::BestEffort);
    }

    #[test]
    fn sanitized_snaps_lut_size() {
        let snap = |size| VideoSettings::new().gamma(0.5, size).sanitized().gamma.lut_size;
        assert_eq!(snap(0), GAMMA_LUT_MIN_SIZE);
        assert_eq!(snap(300), 512);
        assert_eq!(snap(1024), 1024);
        assert_eq!(snap(4096), GAMMA_CHANNEL_WORDS);
    }

    #[test]
    fn rejects_bad_exponent_without_coercing() {
        let cfg = PipelineConfig::new().video(VideoSettings::new().gamma(-0.2, 256));
        assert!(matches!(cfg.validate(), Err(PipelineError::InvalidConfig(_))));
        let cfg = PipelineConfig::new().video(VideoSettings::new().gamma(f64::INFINITY, 256));
        assert!(matches!(cfg.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_oversized_lut() {
        let cfg = PipelineConfig::new().video(VideoSettings::new().gamma(0.5, 2048));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("channel window"), "{err}");
    }

    #[test]
    fn rejects_null_frame_buffer_region() {
        let mut cfg = PipelineConfig::default();
        cfg.frame_buffer_region = 0;
        assert!(cfg.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_fills_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{ "scaler": 2, "video": { "gamma": { "exponent": 0.45 } } }"#,
        )
        .unwrap();
        assert_eq!(cfg.scaler, DeviceId(2));
        assert_eq!(cfg.video.gamma.exponent, 0.45);
        assert_eq!(cfg.video.gamma.lut_size, DEFAULT_GAMMA_LUT_SIZE);
        assert_eq!(cfg.video.input.to_string(), "1920x1080@30");
    }
}
