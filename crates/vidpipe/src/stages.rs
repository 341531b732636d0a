//! Per-block configuration helpers and the handles the orchestrator keeps for each block.
use vidpipe_core::prelude::*;
use vidpipe_hal::{
    BufferEngine, DeviceId, IrqControllerId, RegisterBlock, Subsystem, SubsystemConfig,
};

use crate::config::{GAMMA_CHANNEL_OFFSETS, IrqSlot, PipelineConfig};
use crate::error::{BufferSide, PipelineError, Stage};

/// Last known status of a hardware block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Idle,
    Configured,
    /// Running on its own (free-running blocks, or streaming after `start()`).
    Started,
    /// Failed with the given [`PipelineError::code`].
    Faulted(&'static str),
}

/// Read-only view of one hardware block as the orchestrator sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageHandle {
    stage: Stage,
    side: Option<BufferSide>,
    device: Option<DeviceId>,
    base_address: Option<u64>,
    status: StageStatus,
}

impl StageHandle {
    fn new(stage: Stage, device: Option<DeviceId>, base_address: Option<u64>) -> Self {
        Self {
            stage,
            side: None,
            device,
            base_address,
            status: StageStatus::Idle,
        }
    }

    fn engine(side: BufferSide, slot: &IrqSlot) -> Self {
        Self {
            side: Some(side),
            ..Self::new(Stage::CaptureBuffers, Some(slot.device), Some(slot.base_address))
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Which frame-buffer engine this is; `None` for every other block.
    pub fn side(&self) -> Option<BufferSide> {
        self.side
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    /// Register base; the scaler's is only known once its config has been looked up.
    pub fn base_address(&self) -> Option<u64> {
        self.base_address
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }
}

/// One handle per hardware block, in sequence order.
#[derive(Debug, Clone)]
pub(crate) struct StageHandles {
    handles: Vec<StageHandle>,
}

impl StageHandles {
    pub(crate) fn from_config(config: &PipelineConfig) -> Self {
        let handles = vec![
            StageHandle::new(
                Stage::Power,
                Some(config.power.device),
                Some(config.power.base_address),
            ),
            StageHandle::new(
                Stage::Transport,
                Some(config.transport.device),
                Some(config.transport.base_address),
            ),
            // Reached through the transport, so it has no registers of its own here.
            StageHandle::new(Stage::Sensor, None, None),
            StageHandle::engine(BufferSide::Write, &config.frame_buffer_write),
            StageHandle::engine(BufferSide::Read, &config.frame_buffer_read),
            StageHandle::new(
                Stage::Demosaic,
                Some(config.demosaic.device),
                Some(config.demosaic.base_address),
            ),
            StageHandle::new(
                Stage::Gamma,
                Some(config.gamma.device),
                Some(config.gamma.base_address),
            ),
            StageHandle::new(Stage::Scaler, Some(config.scaler), None),
        ];
        Self { handles }
    }

    /// Status a block settles in after its bring-up step succeeds.
    pub(crate) fn settled_status(stage: Stage) -> StageStatus {
        match stage {
            Stage::Demosaic | Stage::Gamma => StageStatus::Started,
            _ => StageStatus::Configured,
        }
    }

    /// Update every block of `stage`. Stages without a hardware block are ignored.
    pub(crate) fn mark(&mut self, stage: Stage, status: StageStatus) {
        for handle in self.handles.iter_mut().filter(|h| h.stage == stage) {
            handle.status = status;
        }
    }

    /// Record a failure on the block it belongs to.
    ///
    /// A single-engine buffer fault only faults that engine; the other keeps its status.
    pub(crate) fn fault(&mut self, stage: Stage, err: &PipelineError) {
        let status = StageStatus::Faulted(err.code());
        match err {
            PipelineError::BufferFault {
                side: side @ (BufferSide::Write | BufferSide::Read),
                ..
            } => {
                if let Some(handle) = self.engine_mut(*side) {
                    handle.status = status;
                }
            }
            _ => self.mark(stage, status),
        }
    }

    fn engine_mut(&mut self, side: BufferSide) -> Option<&mut StageHandle> {
        self.handles.iter_mut().find(|h| h.side == Some(side))
    }

    pub(crate) fn engine(&self, side: BufferSide) -> Option<&StageHandle> {
        self.handles.iter().find(|h| h.side == Some(side))
    }

    pub(crate) fn set_base(&mut self, stage: Stage, base_address: u64) {
        if let Some(handle) = self.handles.iter_mut().find(|h| h.stage == stage) {
            handle.base_address = Some(base_address);
        }
    }

    /// First block of `stage`; the write engine for [`Stage::CaptureBuffers`].
    pub(crate) fn get(&self, stage: Stage) -> Option<&StageHandle> {
        self.handles.iter().find(|h| h.stage == stage)
    }

    pub(crate) fn as_slice(&self) -> &[StageHandle] {
        &self.handles
    }
}

/// Color reconstruction block setup.
pub struct DemosaicStage<'a> {
    block: &'a mut dyn RegisterBlock,
    device: DeviceId,
}

impl<'a> DemosaicStage<'a> {
    pub fn new(block: &'a mut dyn RegisterBlock, device: DeviceId) -> Self {
        Self { block, device }
    }

    /// Program frame size and bayer phase, then leave the block free-running.
    pub fn configure(&mut self, frame: Resolution, phase: BayerPhase) -> Result<(), PipelineError> {
        self.block
            .initialize(self.device)
            .map_err(|cause| PipelineError::StageFault {
                stage: Stage::Demosaic,
                cause,
            })?;
        self.block.set_param(RegisterParam::Width, frame.width.get());
        self.block.set_param(RegisterParam::Height, frame.height.get());
        self.block
            .set_param(RegisterParam::BayerPhase, phase.register_value());
        self.block.enable_auto_restart();
        self.block.start();
        Ok(())
    }
}

/// Tone mapping block setup.
pub struct GammaStage<'a> {
    block: &'a mut dyn RegisterBlock,
    device: DeviceId,
}

impl<'a> GammaStage<'a> {
    pub fn new(block: &'a mut dyn RegisterBlock, device: DeviceId) -> Self {
        Self { block, device }
    }

    /// Program frame size and format, load `table` into all three channel windows and
    /// leave the block free-running.
    pub fn configure(
        &mut self,
        frame: Resolution,
        format: ColorFormat,
        table: &GammaTable,
    ) -> Result<(), PipelineError> {
        self.block
            .initialize(self.device)
            .map_err(|cause| PipelineError::StageFault {
                stage: Stage::Gamma,
                cause,
            })?;
        self.block.set_param(RegisterParam::Width, frame.width.get());
        self.block.set_param(RegisterParam::Height, frame.height.get());
        self.block.set_param(RegisterParam::VideoFormat, format.id());
        for offset in GAMMA_CHANNEL_OFFSETS {
            self.block.write_memory16(offset, table.entries());
        }
        self.block.enable_auto_restart();
        self.block.start();
        Ok(())
    }
}

/// The write/read frame-buffer engine pair.
pub struct CaptureBufferManager<'a> {
    engine: &'a mut dyn BufferEngine,
}

impl<'a> CaptureBufferManager<'a> {
    pub fn new(engine: &'a mut dyn BufferEngine) -> Self {
        Self { engine }
    }

    /// Bring up the write engine, then the read engine on the same region.
    pub fn init(
        &mut self,
        controller: IrqControllerId,
        write: &IrqSlot,
        read: &IrqSlot,
        region: u64,
    ) -> Result<(), PipelineError> {
        self.engine
            .init_write(write.device, write.irq(controller), region)
            .map_err(|cause| PipelineError::BufferFault {
                side: BufferSide::Write,
                cause,
            })?;
        self.engine
            .init_read(read.device, read.irq(controller), region)
            .map_err(|cause| PipelineError::BufferFault {
                side: BufferSide::Read,
                cause,
            })
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.engine
            .start()
            .map_err(|cause| PipelineError::BufferFault {
                side: BufferSide::Transfer,
                cause,
            })
    }
}

/// Scaler subsystem setup, split around stream negotiation.
///
/// [`bind`](Self::bind) yields the synthesized config whose depth and pixels-per-clock
/// the stream descriptors need; [`commit`](Self::commit) stages both descriptors and
/// applies them together.
pub struct ScalerSubsystem<'a> {
    subsystem: &'a mut dyn Subsystem,
}

impl<'a> ScalerSubsystem<'a> {
    pub fn new(subsystem: &'a mut dyn Subsystem) -> Self {
        Self { subsystem }
    }

    pub fn bind(&mut self, device: DeviceId) -> Result<SubsystemConfig, PipelineError> {
        let config = self
            .subsystem
            .lookup_config(device)
            .ok_or(PipelineError::SubsystemNotFound(device))?;
        self.subsystem.reset_log();
        self.subsystem
            .cfg_initialize(&config)
            .map_err(PipelineError::SubsystemConfigFault)?;
        Ok(config)
    }

    pub fn commit(
        &mut self,
        input: &VideoStreamDescriptor,
        output: &VideoStreamDescriptor,
    ) -> Result<(), PipelineError> {
        self.subsystem.set_input_stream(input);
        self.subsystem.set_output_stream(output);
        self.subsystem
            .apply_config()
            .map_err(PipelineError::SubsystemConfigFault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidpipe_hal::prelude::*;

    fn frame() -> Resolution {
        Resolution::new(1920, 1080).unwrap()
    }

    #[test]
    fn demosaic_programs_phase_then_starts() {
        let rig = VirtualRig::new(DeviceId(0));
        let view = rig.demosaic.clone();
        let mut block = rig.demosaic;
        DemosaicStage::new(&mut block, DeviceId(2))
            .configure(frame(), BayerPhase::Gbrg)
            .unwrap();
        assert_eq!(view.param(RegisterParam::Width), Some(1920));
        assert_eq!(view.param(RegisterParam::Height), Some(1080));
        assert_eq!(view.param(RegisterParam::BayerPhase), Some(2));
        assert!(view.auto_restart() && view.started());
        assert_eq!(
            rig.log.calls().first(),
            Some(&HwCall::BlockInit(BlockKind::Demosaic, DeviceId(2)))
        );
    }

    #[test]
    fn demosaic_init_failure_writes_nothing() {
        let rig = VirtualRig::new(DeviceId(0));
        rig.faults.inject(FaultPoint::DemosaicInit, HwError::Status(-19));
        let mut block = rig.demosaic.clone();
        let err = DemosaicStage::new(&mut block, DeviceId(0))
            .configure(frame(), BayerPhase::Rggb)
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Demosaic));
        assert_eq!(rig.log.len(), 1);
        assert!(!rig.demosaic.started());
    }

    #[test]
    fn gamma_loads_every_channel_window() {
        let rig = VirtualRig::new(DeviceId(0));
        let view = rig.gamma.clone();
        let mut block = rig.gamma;
        let table = GammaTable::compute(64, 0.5).unwrap();
        GammaStage::new(&mut block, DeviceId(0))
            .configure(frame(), ColorFormat::Rgb, &table)
            .unwrap();
        for offset in GAMMA_CHANNEL_OFFSETS {
            assert_eq!(view.memory16(offset, 64), table.entries());
        }
        assert_eq!(view.param(RegisterParam::VideoFormat), Some(0));
        assert_eq!(
            rig.log
                .count(|c| matches!(c, HwCall::BlockWriteMemory { words: 64, .. })),
            3
        );
    }

    #[test]
    fn buffers_init_write_before_read() {
        let rig = VirtualRig::new(DeviceId(0));
        let cfg = PipelineConfig::default();
        let mut engine = rig.buffers.clone();
        CaptureBufferManager::new(&mut engine)
            .init(
                cfg.interrupt_controller,
                &cfg.frame_buffer_write,
                &cfg.frame_buffer_read,
                cfg.frame_buffer_region,
            )
            .unwrap();
        let calls = rig.log.calls();
        assert!(matches!(
            calls[0],
            HwCall::BufferInitWrite { irq, region: 0x1000_0000, .. } if irq.vector == 122
        ));
        assert!(matches!(
            calls[1],
            HwCall::BufferInitRead { irq, .. } if irq.vector == 123
        ));
    }

    #[test]
    fn read_side_failure_is_labelled() {
        let rig = VirtualRig::new(DeviceId(0));
        rig.faults.inject(FaultPoint::BufferInitRead, HwError::NoResponse);
        let cfg = PipelineConfig::default();
        let mut engine = rig.buffers.clone();
        let err = CaptureBufferManager::new(&mut engine)
            .init(
                cfg.interrupt_controller,
                &cfg.frame_buffer_write,
                &cfg.frame_buffer_read,
                cfg.frame_buffer_region,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::BufferFault {
                side: BufferSide::Read,
                ..
            }
        ));
    }

    #[test]
    fn scaler_bind_reports_missing_device() {
        let rig = VirtualRig::new(DeviceId(1));
        let mut scaler = rig.scaler.clone();
        let err = ScalerSubsystem::new(&mut scaler)
            .bind(DeviceId(5))
            .unwrap_err();
        assert_eq!(err, PipelineError::SubsystemNotFound(DeviceId(5)));
        assert_eq!(rig.log.calls(), vec![HwCall::SubsystemLookup(DeviceId(5))]);
    }

    #[test]
    fn handles_track_status_and_late_base() {
        let mut handles = StageHandles::from_config(&PipelineConfig::default());
        assert!(handles
            .as_slice()
            .iter()
            .all(|h| h.status() == StageStatus::Idle));
        assert!(handles.get(Stage::StreamFormat).is_none());
        handles.mark(Stage::Gamma, StageHandles::settled_status(Stage::Gamma));
        handles.set_base(Stage::Scaler, 0xA004_0000);
        assert_eq!(handles.get(Stage::Gamma).unwrap().status(), StageStatus::Started);
        assert_eq!(
            handles.get(Stage::Scaler).unwrap().base_address(),
            Some(0xA004_0000)
        );
    }

    #[test]
    fn each_buffer_engine_gets_its_own_handle() {
        let mut cfg = PipelineConfig::default();
        cfg.frame_buffer_write.base_address = 0xDEAD_0000;
        cfg.frame_buffer_read.device = DeviceId(9);
        cfg.frame_buffer_read.base_address = 0xBEEF_0000;
        let mut handles = StageHandles::from_config(&cfg);

        let read = handles.engine(BufferSide::Read).unwrap();
        assert_eq!(read.stage(), Stage::CaptureBuffers);
        assert_eq!(read.device(), Some(DeviceId(9)));
        assert_eq!(read.base_address(), Some(0xBEEF_0000));
        let write = handles.get(Stage::CaptureBuffers).unwrap();
        assert_eq!(write.side(), Some(BufferSide::Write));
        assert_eq!(write.base_address(), Some(0xDEAD_0000));

        let err = PipelineError::BufferFault {
            side: BufferSide::Read,
            cause: HwError::NoResponse,
        };
        handles.mark(Stage::CaptureBuffers, StageStatus::Configured);
        handles.fault(Stage::CaptureBuffers, &err);
        assert_eq!(
            handles.engine(BufferSide::Write).unwrap().status(),
            StageStatus::Configured
        );
        assert_eq!(
            handles.engine(BufferSide::Read).unwrap().status(),
            StageStatus::Faulted("buffer_fault")
        );
    }
}
