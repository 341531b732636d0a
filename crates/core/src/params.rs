use std::fmt;

/// Named configuration register exposed by the free-running processing blocks.
///
/// # Example
/// ```rust
/// use vidpipe_core::prelude::RegisterParam;
///
/// assert_eq!(RegisterParam::BayerPhase.name(), "bayer_phase");
/// assert_eq!("width".parse::<RegisterParam>(), Ok(RegisterParam::Width));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RegisterParam {
    /// Active pixels per line.
    Width,
    /// Active lines per frame.
    Height,
    /// Color-filter arrangement (demosaic only).
    BayerPhase,
    /// Color format id (gamma only).
    VideoFormat,
}

impl RegisterParam {
    /// Register name as it appears in the block's register map.
    pub const fn name(self) -> &'static str {
        match self {
            RegisterParam::Width => "width",
            RegisterParam::Height => "height",
            RegisterParam::BayerPhase => "bayer_phase",
            RegisterParam::VideoFormat => "video_format",
        }
    }
}

impl fmt::Display for RegisterParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RegisterParam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "width" => Ok(RegisterParam::Width),
            "height" => Ok(RegisterParam::Height),
            "bayer_phase" => Ok(RegisterParam::BayerPhase),
            "video_format" => Ok(RegisterParam::VideoFormat),
            other => Err(format!("unknown register parameter {other:?}")),
        }
    }
}
