//! Virtual hardware that records every call and can be told to fail at any step.
//!
//! Every fake is `Clone` and shares its state through `Arc`, so a test can hand one copy to
//! the pipeline and keep another to inspect afterwards.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use vidpipe_core::prelude::*;

use crate::{
    BufferEngine, DeviceId, HwError, IrqBinding, PowerController, RegisterBlock,
    SensorController, SensorDescriptor, SensorModel, SensorTransport, Subsystem,
    SubsystemConfig, TransportHandle,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Which free-running block a [`VirtualRegisterBlock`] stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Demosaic,
    Gamma,
}

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwCall {
    PowerInit(DeviceId),
    PowerEnable,
    PowerPresence,
    TransportInit(DeviceId, IrqBinding),
    SensorDetect(TransportHandle),
    SensorBayerPhase,
    SensorConfigure,
    BufferInitWrite { device: DeviceId, irq: IrqBinding, region: u64 },
    BufferInitRead { device: DeviceId, irq: IrqBinding, region: u64 },
    BufferStart,
    BlockInit(BlockKind, DeviceId),
    BlockSetParam(BlockKind, RegisterParam, u32),
    BlockWriteMemory { block: BlockKind, offset: u32, words: usize },
    BlockAutoRestart(BlockKind),
    BlockStart(BlockKind),
    SubsystemLookup(DeviceId),
    SubsystemResetLog,
    SubsystemInit(DeviceId),
    SubsystemSetInput(VideoModeId),
    SubsystemSetOutput(VideoModeId),
    SubsystemApply,
}

impl HwCall {
    /// Whether the call touched the sensor controller.
    pub fn is_sensor(&self) -> bool {
        matches!(
            self,
            HwCall::SensorDetect(_) | HwCall::SensorBayerPhase | HwCall::SensorConfigure
        )
    }

    /// Whether the call touched the frame-buffer engines.
    pub fn is_buffer(&self) -> bool {
        matches!(
            self,
            HwCall::BufferInitWrite { .. } | HwCall::BufferInitRead { .. } | HwCall::BufferStart
        )
    }

    /// Whether the call touched the demosaic or gamma block.
    pub fn is_block(&self, kind: BlockKind) -> bool {
        match self {
            HwCall::BlockInit(k, _)
            | HwCall::BlockSetParam(k, _, _)
            | HwCall::BlockAutoRestart(k)
            | HwCall::BlockStart(k) => *k == kind,
            HwCall::BlockWriteMemory { block, .. } => *block == kind,
            _ => false,
        }
    }

    /// Whether the call touched the scaler subsystem.
    pub fn is_subsystem(&self) -> bool {
        matches!(
            self,
            HwCall::SubsystemLookup(_)
                | HwCall::SubsystemResetLog
                | HwCall::SubsystemInit(_)
                | HwCall::SubsystemSetInput(_)
                | HwCall::SubsystemSetOutput(_)
                | HwCall::SubsystemApply
        )
    }
}

/// Ordered log of calls shared by every fake in a rig.
///
/// # Example
/// ```rust
/// use vidpipe_hal::prelude::*;
///
/// let log = CallLog::default();
/// log.record(HwCall::PowerEnable);
/// assert_eq!(log.count(|c| matches!(c, HwCall::PowerEnable)), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    inner: Arc<Mutex<Vec<HwCall>>>,
}

impl CallLog {
    pub fn record(&self, call: HwCall) {
        lock(&self.inner).push(call);
    }

    /// Snapshot of every call so far, oldest first.
    pub fn calls(&self) -> Vec<HwCall> {
        lock(&self.inner).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }

    pub fn count(&self, pred: impl Fn(&HwCall) -> bool) -> usize {
        lock(&self.inner).iter().filter(|c| pred(c)).count()
    }

    /// Index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&HwCall) -> bool) -> Option<usize> {
        lock(&self.inner).iter().position(pred)
    }

    pub fn clear(&self) {
        lock(&self.inner).clear();
    }
}

/// Operation a [`FaultPlan`] can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    PowerInit,
    PowerEnable,
    TransportInit,
    SensorDetect,
    SensorConfigure,
    BufferInitWrite,
    BufferInitRead,
    BufferStart,
    DemosaicInit,
    GammaInit,
    /// Makes `lookup_config` report no device; the stored error is ignored.
    SubsystemLookup,
    SubsystemInit,
    SubsystemApply,
}

/// Injected failures, keyed by operation. Faults persist until cleared.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    inner: Arc<Mutex<HashMap<FaultPoint, HwError>>>,
}

impl FaultPlan {
    pub fn inject(&self, point: FaultPoint, err: HwError) {
        lock(&self.inner).insert(point, err);
    }

    pub fn clear(&self, point: FaultPoint) {
        lock(&self.inner).remove(&point);
    }

    pub fn clear_all(&self) {
        lock(&self.inner).clear();
    }

    fn check(&self, point: FaultPoint) -> Result<(), HwError> {
        match lock(&self.inner).get(&point) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn armed(&self, point: FaultPoint) -> bool {
        lock(&self.inner).contains_key(&point)
    }
}

/// Virtual power/presence I/O block.
#[derive(Debug, Clone)]
pub struct VirtualPower {
    log: CallLog,
    faults: FaultPlan,
    present: Arc<Mutex<bool>>,
}

impl VirtualPower {
    pub fn new(log: CallLog, faults: FaultPlan) -> Self {
        Self {
            log,
            faults,
            present: Arc::new(Mutex::new(true)),
        }
    }

    /// Change what the presence line reads.
    pub fn set_present(&self, present: bool) {
        *lock(&self.present) = present;
    }
}

impl PowerController for VirtualPower {
    fn initialize(&mut self, device: DeviceId) -> Result<(), HwError> {
        self.log.record(HwCall::PowerInit(device));
        self.faults.check(FaultPoint::PowerInit)
    }

    fn enable(&mut self) -> Result<(), HwError> {
        self.log.record(HwCall::PowerEnable);
        self.faults.check(FaultPoint::PowerEnable)
    }

    fn read_presence(&self) -> bool {
        self.log.record(HwCall::PowerPresence);
        *lock(&self.present)
    }
}

/// Virtual sensor control bus.
#[derive(Debug, Clone)]
pub struct VirtualTransport {
    log: CallLog,
    faults: FaultPlan,
    bus: u8,
}

impl VirtualTransport {
    pub fn new(log: CallLog, faults: FaultPlan) -> Self {
        Self { log, faults, bus: 0 }
    }
}

impl SensorTransport for VirtualTransport {
    fn init(&mut self, device: DeviceId, irq: IrqBinding) -> Result<TransportHandle, HwError> {
        self.log.record(HwCall::TransportInit(device, irq));
        self.faults.check(FaultPoint::TransportInit)?;
        Ok(TransportHandle(self.bus))
    }
}

/// Virtual image sensor answering detection with a fixed descriptor.
#[derive(Debug, Clone)]
pub struct VirtualSensor {
    log: CallLog,
    faults: FaultPlan,
    descriptor: SensorDescriptor,
}

impl VirtualSensor {
    pub fn new(log: CallLog, faults: FaultPlan) -> Self {
        Self::with_descriptor(log, faults, Self::imx219())
    }

    pub fn with_descriptor(log: CallLog, faults: FaultPlan, descriptor: SensorDescriptor) -> Self {
        Self {
            log,
            faults,
            descriptor,
        }
    }

    /// Descriptor of the 8MP sensor used by default.
    pub fn imx219() -> SensorDescriptor {
        let modes = [(1920, 1080, 30), (1280, 720, 60), (640, 480, 60)]
            .into_iter()
            .filter_map(|(w, h, r)| StreamGeometry::new(w, h, r))
            .collect();
        SensorDescriptor {
            model: SensorModel {
                name: "imx219".into(),
                chip_id: 0x0219,
            },
            bayer_phase: BayerPhase::Bggr,
            modes,
        }
    }

    pub fn descriptor(&self) -> &SensorDescriptor {
        &self.descriptor
    }
}

impl SensorController for VirtualSensor {
    fn detect(&mut self, transport: TransportHandle) -> Result<SensorDescriptor, HwError> {
        self.log.record(HwCall::SensorDetect(transport));
        self.faults.check(FaultPoint::SensorDetect)?;
        Ok(self.descriptor.clone())
    }

    fn bayer_phase(&self) -> BayerPhase {
        self.log.record(HwCall::SensorBayerPhase);
        self.descriptor.bayer_phase
    }

    fn configure(&mut self) -> Result<(), HwError> {
        self.log.record(HwCall::SensorConfigure);
        self.faults.check(FaultPoint::SensorConfigure)
    }
}

/// Virtual write/read frame-buffer pair.
#[derive(Debug, Clone)]
pub struct VirtualBuffers {
    log: CallLog,
    faults: FaultPlan,
}

impl VirtualBuffers {
    pub fn new(log: CallLog, faults: FaultPlan) -> Self {
        Self { log, faults }
    }
}

impl BufferEngine for VirtualBuffers {
    fn init_write(
        &mut self,
        device: DeviceId,
        irq: IrqBinding,
        region: u64,
    ) -> Result<(), HwError> {
        self.log.record(HwCall::BufferInitWrite {
            device,
            irq,
            region,
        });
        self.faults.check(FaultPoint::BufferInitWrite)
    }

    fn init_read(&mut self, device: DeviceId, irq: IrqBinding, region: u64) -> Result<(), HwError> {
        self.log.record(HwCall::BufferInitRead {
            device,
            irq,
            region,
        });
        self.faults.check(FaultPoint::BufferInitRead)
    }

    fn start(&mut self) -> Result<(), HwError> {
        self.log.record(HwCall::BufferStart);
        self.faults.check(FaultPoint::BufferStart)
    }
}

#[derive(Debug, Default)]
struct RegisterFile {
    params: HashMap<RegisterParam, u32>,
    memory: BTreeMap<u32, u16>,
    auto_restart: bool,
    started: bool,
}

/// Virtual register-mapped block with inspectable register and memory contents.
#[derive(Debug, Clone)]
pub struct VirtualRegisterBlock {
    kind: BlockKind,
    log: CallLog,
    faults: FaultPlan,
    regs: Arc<Mutex<RegisterFile>>,
}

impl VirtualRegisterBlock {
    pub fn new(kind: BlockKind, log: CallLog, faults: FaultPlan) -> Self {
        Self {
            kind,
            log,
            faults,
            regs: Arc::default(),
        }
    }

    pub fn param(&self, param: RegisterParam) -> Option<u32> {
        lock(&self.regs).params.get(&param).copied()
    }

    /// `count` 16-bit words of block memory starting at byte `offset`; unwritten words read 0.
    pub fn memory16(&self, offset: u32, count: usize) -> Vec<u16> {
        let regs = lock(&self.regs);
        (0..count as u32)
            .map(|i| regs.memory.get(&(offset + i * 2)).copied().unwrap_or(0))
            .collect()
    }

    pub fn auto_restart(&self) -> bool {
        lock(&self.regs).auto_restart
    }

    pub fn started(&self) -> bool {
        lock(&self.regs).started
    }
}

impl RegisterBlock for VirtualRegisterBlock {
    fn initialize(&mut self, device: DeviceId) -> Result<(), HwError> {
        self.log.record(HwCall::BlockInit(self.kind, device));
        let point = match self.kind {
            BlockKind::Demosaic => FaultPoint::DemosaicInit,
            BlockKind::Gamma => FaultPoint::GammaInit,
        };
        self.faults.check(point)
    }

    fn set_param(&mut self, param: RegisterParam, value: u32) {
        self.log
            .record(HwCall::BlockSetParam(self.kind, param, value));
        lock(&self.regs).params.insert(param, value);
    }

    fn write_memory16(&mut self, offset: u32, values: &[u16]) {
        self.log.record(HwCall::BlockWriteMemory {
            block: self.kind,
            offset,
            words: values.len(),
        });
        let mut regs = lock(&self.regs);
        for (i, v) in values.iter().enumerate() {
            regs.memory.insert(offset + i as u32 * 2, *v);
        }
    }

    fn enable_auto_restart(&mut self) {
        self.log.record(HwCall::BlockAutoRestart(self.kind));
        lock(&self.regs).auto_restart = true;
    }

    fn start(&mut self) {
        self.log.record(HwCall::BlockStart(self.kind));
        lock(&self.regs).started = true;
    }
}

#[derive(Debug, Default)]
struct ScalerState {
    input: Option<VideoStreamDescriptor>,
    output: Option<VideoStreamDescriptor>,
    applied: Option<(VideoStreamDescriptor, VideoStreamDescriptor)>,
}

/// Virtual scaler subsystem.
#[derive(Debug, Clone)]
pub struct VirtualSubsystem {
    log: CallLog,
    faults: FaultPlan,
    config: SubsystemConfig,
    state: Arc<Mutex<ScalerState>>,
}

impl VirtualSubsystem {
    pub fn new(log: CallLog, faults: FaultPlan, config: SubsystemConfig) -> Self {
        Self {
            log,
            faults,
            config,
            state: Arc::default(),
        }
    }

    /// Default synthesized config: 8 bpc, 2 pixels per clock, up to 4K.
    pub fn default_config(device: DeviceId) -> SubsystemConfig {
        SubsystemConfig {
            device_id: device,
            base_address: 0xA004_0000,
            color_depth: ColorDepth::Bpc8,
            pixels_per_clock: PixelsPerClock::Two,
            max_width: 3840,
            max_height: 2160,
        }
    }

    /// Input/output pair committed by the last successful `apply_config`.
    pub fn applied(&self) -> Option<(VideoStreamDescriptor, VideoStreamDescriptor)> {
        lock(&self.state).applied
    }
}

impl Subsystem for VirtualSubsystem {
    fn lookup_config(&self, device: DeviceId) -> Option<SubsystemConfig> {
        self.log.record(HwCall::SubsystemLookup(device));
        if self.faults.armed(FaultPoint::SubsystemLookup) || device != self.config.device_id {
            return None;
        }
        Some(self.config)
    }

    fn reset_log(&mut self) {
        self.log.record(HwCall::SubsystemResetLog);
    }

    fn cfg_initialize(&mut self, config: &SubsystemConfig) -> Result<(), HwError> {
        self.log.record(HwCall::SubsystemInit(config.device_id));
        self.faults.check(FaultPoint::SubsystemInit)
    }

    fn set_input_stream(&mut self, stream: &VideoStreamDescriptor) {
        self.log.record(HwCall::SubsystemSetInput(stream.mode));
        lock(&self.state).input = Some(*stream);
    }

    fn set_output_stream(&mut self, stream: &VideoStreamDescriptor) {
        self.log.record(HwCall::SubsystemSetOutput(stream.mode));
        lock(&self.state).output = Some(*stream);
    }

    fn apply_config(&mut self) -> Result<(), HwError> {
        self.log.record(HwCall::SubsystemApply);
        self.faults.check(FaultPoint::SubsystemApply)?;
        let mut state = lock(&self.state);
        match (state.input, state.output) {
            (Some(input), Some(output)) => {
                state.applied = Some((input, output));
                Ok(())
            }
            _ => Err(HwError::Rejected(
                "input and output streams must both be set".into(),
            )),
        }
    }
}

/// A full set of virtual collaborators sharing one [`CallLog`] and [`FaultPlan`].
///
/// # Example
/// ```rust
/// use vidpipe_hal::prelude::*;
///
/// let mut rig = VirtualRig::new(DeviceId(0));
/// rig.faults.inject(FaultPoint::SensorDetect, HwError::NoResponse);
/// let err = rig.sensor.detect(TransportHandle(0)).unwrap_err();
/// assert_eq!(err, HwError::NoResponse);
/// assert_eq!(rig.log.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct VirtualRig {
    pub log: CallLog,
    pub faults: FaultPlan,
    pub power: VirtualPower,
    pub transport: VirtualTransport,
    pub sensor: VirtualSensor,
    pub buffers: VirtualBuffers,
    pub demosaic: VirtualRegisterBlock,
    pub gamma: VirtualRegisterBlock,
    pub scaler: VirtualSubsystem,
}

impl VirtualRig {
    /// Build a rig whose scaler answers `lookup_config` for `scaler_device`.
    pub fn new(scaler_device: DeviceId) -> Self {
        let log = CallLog::default();
        let faults = FaultPlan::default();
        Self {
            power: VirtualPower::new(log.clone(), faults.clone()),
            transport: VirtualTransport::new(log.clone(), faults.clone()),
            sensor: VirtualSensor::new(log.clone(), faults.clone()),
            buffers: VirtualBuffers::new(log.clone(), faults.clone()),
            demosaic: VirtualRegisterBlock::new(BlockKind::Demosaic, log.clone(), faults.clone()),
            gamma: VirtualRegisterBlock::new(BlockKind::Gamma, log.clone(), faults.clone()),
            scaler: VirtualSubsystem::new(
                log.clone(),
                faults.clone(),
                VirtualSubsystem::default_config(scaler_device),
            ),
            log,
            faults,
        }
    }

    /// Replace the sensor with one reporting `descriptor`.
    pub fn with_sensor(mut self, descriptor: SensorDescriptor) -> Self {
        self.sensor =
            VirtualSensor::with_descriptor(self.log.clone(), self.faults.clone(), descriptor);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(catalog: &StandardCatalog, w: u32, h: u32, hz: u32) -> VideoStreamDescriptor {
        let rate = FrameRate::new(hz).unwrap();
        let mode = catalog.lookup_mode(w, h, rate).unwrap();
        VideoStreamDescriptor {
            mode,
            timing: catalog.lookup_timing(mode).unwrap(),
            color_format: ColorFormat::Rgb,
            color_depth: ColorDepth::Bpc8,
            pixels_per_clock: PixelsPerClock::Two,
            frame_rate: rate,
            interlaced: false,
        }
    }

    #[test]
    fn clones_share_register_state() {
        let rig = VirtualRig::new(DeviceId(0));
        let view = rig.gamma.clone();
        let mut block = rig.gamma;
        block.set_param(RegisterParam::Width, 1920);
        block.write_memory16(0x800, &[1, 2, 3]);
        assert_eq!(view.param(RegisterParam::Width), Some(1920));
        assert_eq!(view.memory16(0x800, 4), vec![1, 2, 3, 0]);
    }

    #[test]
    fn apply_requires_both_streams() {
        let catalog = StandardCatalog::new();
        let mut rig = VirtualRig::new(DeviceId(0));
        rig.scaler
            .set_input_stream(&stream(&catalog, 1920, 1080, 30));
        assert!(matches!(rig.scaler.apply_config(), Err(HwError::Rejected(_))));
        rig.scaler
            .set_output_stream(&stream(&catalog, 1280, 720, 60));
        assert!(rig.scaler.apply_config().is_ok());
        let (input, output) = rig.scaler.applied().unwrap();
        assert_eq!(input.timing.h_active, 1920);
        assert_eq!(output.timing.h_active, 1280);
    }

    #[test]
    fn lookup_fault_hides_device() {
        let rig = VirtualRig::new(DeviceId(3));
        assert!(rig.scaler.lookup_config(DeviceId(3)).is_some());
        assert!(rig.scaler.lookup_config(DeviceId(4)).is_none());
        rig.faults
            .inject(FaultPoint::SubsystemLookup, HwError::NoDevice(DeviceId(3)));
        assert!(rig.scaler.lookup_config(DeviceId(3)).is_none());
        rig.faults.clear(FaultPoint::SubsystemLookup);
        assert!(rig.scaler.lookup_config(DeviceId(3)).is_some());
    }

    #[test]
    fn call_classification() {
        assert!(HwCall::SensorConfigure.is_sensor());
        assert!(HwCall::BufferStart.is_buffer());
        assert!(HwCall::BlockStart(BlockKind::Gamma).is_block(BlockKind::Gamma));
        assert!(!HwCall::BlockStart(BlockKind::Gamma).is_block(BlockKind::Demosaic));
        assert!(HwCall::SubsystemApply.is_subsystem());
        assert!(!HwCall::PowerEnable.is_subsystem());
    }
}
