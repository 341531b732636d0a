#![doc = include_str!("../README.md")]

use std::fmt;

use smallvec::SmallVec;

use vidpipe_core::prelude::*;

/// Hardware instance identifier as assigned by the platform's device table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeviceId(pub u16);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev#{}", self.0)
    }
}

/// Interrupt controller instance a device's vector is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct IrqControllerId(pub u16);

/// Where a device's interrupt lands: controller plus vector number.
///
/// # Example
/// ```rust
/// use vidpipe_hal::{IrqBinding, IrqControllerId};
///
/// let irq = IrqBinding { controller: IrqControllerId(0), vector: 121 };
/// assert_eq!(irq.vector, 121);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IrqBinding {
    pub controller: IrqControllerId,
    pub vector: u16,
}

/// Opaque bus handle returned by the sensor transport; detection talks through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportHandle(pub u8);

/// Raw failure reported by a hardware collaborator.
///
/// # Example
/// ```rust
/// use vidpipe_hal::HwError;
///
/// let err = HwError::Status(-5);
/// assert_eq!(err.to_string(), "driver returned status -5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HwError {
    #[error("driver returned status {0}")]
    Status(i32),
    #[error("device {0} not present")]
    NoDevice(DeviceId),
    #[error("no response from device")]
    NoResponse,
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Identity of a detected image sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorModel {
    /// Marketing/part name, e.g. `imx219`.
    pub name: String,
    /// Chip id read back from the sensor's id registers.
    pub chip_id: u16,
}

/// What detection learned about the attached sensor. Read-only once produced.
///
/// # Example
/// ```rust
/// use vidpipe_core::prelude::*;
/// use vidpipe_hal::{SensorDescriptor, SensorModel};
///
/// let desc = SensorDescriptor {
///     model: SensorModel { name: "imx219".into(), chip_id: 0x0219 },
///     bayer_phase: BayerPhase::Bggr,
///     modes: smallvec::smallvec![StreamGeometry::new(1920, 1080, 30).unwrap()],
/// };
/// assert!(desc.supports(&StreamGeometry::new(1920, 1080, 30).unwrap()));
/// assert!(!desc.supports(&StreamGeometry::new(1920, 1080, 60).unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorDescriptor {
    pub model: SensorModel,
    pub bayer_phase: BayerPhase,
    /// Geometry/rate combinations the sensor can stream.
    pub modes: SmallVec<[StreamGeometry; 4]>,
}

impl SensorDescriptor {
    /// Whether `geometry` is one of the advertised modes.
    pub fn supports(&self, geometry: &StreamGeometry) -> bool {
        self.modes.iter().any(|m| m == geometry)
    }
}

/// Static configuration of the scaler subsystem as synthesized into hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubsystemConfig {
    pub device_id: DeviceId,
    pub base_address: u64,
    pub color_depth: ColorDepth,
    pub pixels_per_clock: PixelsPerClock,
    pub max_width: u32,
    pub max_height: u32,
}

/// Discrete I/O block driving the sensor's power/enable line.
pub trait PowerController: Send {
    /// Bind the I/O block and set line directions.
    fn initialize(&mut self, device: DeviceId) -> Result<(), HwError>;

    /// Drive the enable line high.
    fn enable(&mut self) -> Result<(), HwError>;

    /// Sample the presence line.
    fn read_presence(&self) -> bool;
}

/// Point-to-point control channel to the sensor.
pub trait SensorTransport: Send {
    /// Initialize the channel and bind its interrupt.
    fn init(&mut self, device: DeviceId, irq: IrqBinding) -> Result<TransportHandle, HwError>;
}

/// Sensor-side control: identification and stream start.
pub trait SensorController: Send {
    /// Identify the attached sensor over `transport`.
    fn detect(&mut self, transport: TransportHandle) -> Result<SensorDescriptor, HwError>;

    /// Color-filter phase of the detected sensor.
    fn bayer_phase(&self) -> BayerPhase;

    /// Program the streaming mode and begin output.
    fn configure(&mut self) -> Result<(), HwError>;
}

/// The write/read DMA frame-buffer pair sharing one memory region.
///
/// `init_write` must run before `init_read`: the read engine lays its buffers out in
/// the region the write engine establishes.
pub trait BufferEngine: Send {
    fn init_write(&mut self, device: DeviceId, irq: IrqBinding, region: u64)
    -> Result<(), HwError>;

    fn init_read(&mut self, device: DeviceId, irq: IrqBinding, region: u64)
    -> Result<(), HwError>;

    /// Enable both engines for active transfer.
    fn start(&mut self) -> Result<(), HwError>;
}

/// Register-mapped, free-running processing block (demosaic, gamma).
pub trait RegisterBlock: Send {
    fn initialize(&mut self, device: DeviceId) -> Result<(), HwError>;

    fn set_param(&mut self, param: RegisterParam, value: u32);

    /// Write 16-bit words into block-local memory starting at `offset` bytes.
    fn write_memory16(&mut self, offset: u32, values: &[u16]);

    fn enable_auto_restart(&mut self);

    fn start(&mut self);
}

/// Scaler/format-conversion subsystem.
///
/// Input and output streams are staged with the setters and committed together by
/// [`Subsystem::apply_config`].
pub trait Subsystem: Send {
    fn lookup_config(&self, device: DeviceId) -> Option<SubsystemConfig>;

    /// Clear the subsystem's internal event log.
    fn reset_log(&mut self);

    fn cfg_initialize(&mut self, config: &SubsystemConfig) -> Result<(), HwError>;

    fn set_input_stream(&mut self, stream: &VideoStreamDescriptor);

    fn set_output_stream(&mut self, stream: &VideoStreamDescriptor);

    fn apply_config(&mut self) -> Result<(), HwError>;
}

pub mod virtual_hw;

pub mod prelude {
    pub use crate::{
        BufferEngine, DeviceId, HwError, IrqBinding, IrqControllerId, PowerController,
        RegisterBlock, SensorController, SensorDescriptor, SensorModel, SensorTransport,
        Subsystem, SubsystemConfig, TransportHandle,
        virtual_hw::{
            BlockKind, CallLog, FaultPlan, FaultPoint, HwCall, VirtualBuffers, VirtualPower,
            VirtualRegisterBlock, VirtualRig, VirtualSensor, VirtualSubsystem,
            VirtualTransport,
        },
    };
    pub use vidpipe_core::prelude::*;
}
