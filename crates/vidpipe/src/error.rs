use std::fmt;

use vidpipe_hal::{DeviceId, HwError};

use crate::negotiate::UnsupportedVideoMode;

/// Named step of the bring-up sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Stage {
    Power,
    Transport,
    Sensor,
    CaptureBuffers,
    Demosaic,
    Gamma,
    StreamFormat,
    Scaler,
    /// Sensor streaming and DMA enable, run by `start()`.
    Stream,
}

impl Stage {
    /// Every stage in sequence order.
    pub const ALL: [Stage; 9] = [
        Stage::Power,
        Stage::Transport,
        Stage::Sensor,
        Stage::CaptureBuffers,
        Stage::Demosaic,
        Stage::Gamma,
        Stage::StreamFormat,
        Stage::Scaler,
        Stage::Stream,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Stage::Power => "power",
            Stage::Transport => "transport",
            Stage::Sensor => "sensor",
            Stage::CaptureBuffers => "capture_buffers",
            Stage::Demosaic => "demosaic",
            Stage::Gamma => "gamma",
            Stage::StreamFormat => "stream_format",
            Stage::Scaler => "scaler",
            Stage::Stream => "stream",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One side of the frame-buffer pair, or both when enabling transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSide {
    Write,
    Read,
    /// Enabling both engines for transfer.
    Transfer,
}

impl fmt::Display for BufferSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BufferSide::Write => "write",
            BufferSide::Read => "read",
            BufferSide::Transfer => "transfer",
        })
    }
}

/// Errors from pipeline construction, bring-up and start.
///
/// # Example
/// ```rust
/// use vidpipe::prelude::*;
///
/// let err = PipelineError::SensorNotFound(HwError::NoResponse);
/// assert_eq!(err.code(), "sensor_not_found");
/// assert_eq!(err.stage(), Some(Stage::Sensor));
/// eprintln!("bring-up failed: {err}");
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    #[error("power controller fault: {0}")]
    PowerFault(#[source] HwError),
    #[error("sensor transport fault: {0}")]
    TransportFault(#[source] HwError),
    #[error("no sensor detected: {0}")]
    SensorNotFound(#[source] HwError),
    #[error("frame buffer {side} fault: {cause}")]
    BufferFault {
        side: BufferSide,
        #[source]
        cause: HwError,
    },
    #[error("{stage} block fault: {cause}")]
    StageFault {
        stage: Stage,
        #[source]
        cause: HwError,
    },
    #[error("scaler subsystem {0} not found")]
    SubsystemNotFound(DeviceId),
    #[error("scaler subsystem configuration fault: {0}")]
    SubsystemConfigFault(#[source] HwError),
    #[error(transparent)]
    UnsupportedVideoMode(#[from] UnsupportedVideoMode),
    #[error("sensor rejected stream start: {0}")]
    SensorStreamFault(#[source] HwError),
    #[error("pipeline must be connected before {action} (state: {state})")]
    PreconditionFault {
        action: &'static str,
        state: &'static str,
    },
}

impl PipelineError {
    /// Stable string code for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidConfig(_) => "invalid_config",
            PipelineError::PowerFault(_) => "power_fault",
            PipelineError::TransportFault(_) => "transport_fault",
            PipelineError::SensorNotFound(_) => "sensor_not_found",
            PipelineError::BufferFault { .. } => "buffer_fault",
            PipelineError::StageFault { .. } => "stage_fault",
            PipelineError::SubsystemNotFound(_) => "subsystem_not_found",
            PipelineError::SubsystemConfigFault(_) => "subsystem_config_fault",
            PipelineError::UnsupportedVideoMode(_) => "unsupported_video_mode",
            PipelineError::SensorStreamFault(_) => "sensor_stream_fault",
            PipelineError::PreconditionFault { .. } => "precondition_fault",
        }
    }

    /// Stage the error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::InvalidConfig(_) | PipelineError::PreconditionFault { .. } => None,
            PipelineError::PowerFault(_) => Some(Stage::Power),
            PipelineError::TransportFault(_) => Some(Stage::Transport),
            PipelineError::SensorNotFound(_) => Some(Stage::Sensor),
            PipelineError::BufferFault {
                side: BufferSide::Transfer,
                ..
            } => Some(Stage::Stream),
            PipelineError::BufferFault { .. } => Some(Stage::CaptureBuffers),
            PipelineError::StageFault { stage, .. } => Some(*stage),
            PipelineError::SubsystemNotFound(_) | PipelineError::SubsystemConfigFault(_) => {
                Some(Stage::Scaler)
            }
            PipelineError::UnsupportedVideoMode(_) => Some(Stage::StreamFormat),
            PipelineError::SensorStreamFault(_) => Some(Stage::Stream),
        }
    }

    /// Whether calling again may succeed. The pipeline never retries on its own.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::TransportFault(HwError::NoResponse)
                | PipelineError::SensorNotFound(HwError::NoResponse)
                | PipelineError::SensorStreamFault(_)
                | PipelineError::BufferFault {
                    side: BufferSide::Transfer,
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidpipe_core::prelude::StreamGeometry;

    #[test]
    fn codes_are_unique() {
        let errors = [
            PipelineError::InvalidConfig("x".into()),
            PipelineError::PowerFault(HwError::Status(1)),
            PipelineError::TransportFault(HwError::Status(1)),
            PipelineError::SensorNotFound(HwError::Status(1)),
            PipelineError::BufferFault {
                side: BufferSide::Write,
                cause: HwError::Status(1),
            },
            PipelineError::StageFault {
                stage: Stage::Gamma,
                cause: HwError::Status(1),
            },
            PipelineError::SubsystemNotFound(DeviceId(0)),
            PipelineError::SubsystemConfigFault(HwError::Status(1)),
            PipelineError::UnsupportedVideoMode(UnsupportedVideoMode {
                geometry: StreamGeometry::new(1, 1, 1).unwrap(),
            }),
            PipelineError::SensorStreamFault(HwError::Status(1)),
            PipelineError::PreconditionFault {
                action: "start",
                state: "uninitialized",
            },
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn transfer_fault_is_attributed_to_stream() {
        let write = PipelineError::BufferFault {
            side: BufferSide::Write,
            cause: HwError::Status(2),
        };
        let transfer = PipelineError::BufferFault {
            side: BufferSide::Transfer,
            cause: HwError::Status(2),
        };
        assert_eq!(write.stage(), Some(Stage::CaptureBuffers));
        assert_eq!(transfer.stage(), Some(Stage::Stream));
        assert_eq!(write.to_string(), "frame buffer write fault: driver returned status 2");
    }

    #[test]
    fn stage_fault_names_block() {
        let err = PipelineError::StageFault {
            stage: Stage::Demosaic,
            cause: HwError::NoDevice(DeviceId(4)),
        };
        assert_eq!(err.to_string(), "demosaic block fault: device dev#4 not present");
        assert!(!err.retryable());
    }
}
