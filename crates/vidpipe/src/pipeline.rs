//! The bring-up orchestrator.
use std::time::Instant;

use tracing::{debug, error, info, warn};
use vidpipe_core::prelude::*;
use vidpipe_hal::{
    BufferEngine, PowerController, RegisterBlock, SensorController, SensorDescriptor,
    SensorTransport, Subsystem, SubsystemConfig, virtual_hw::VirtualRig,
};

use crate::config::{PipelineConfig, StartPolicy};
use crate::error::{BufferSide, PipelineError, Stage};
use crate::metrics::BringupMetrics;
use crate::negotiate::StreamFormatNegotiator;
use crate::stages::{
    CaptureBufferManager, DemosaicStage, GammaStage, ScalerSubsystem, StageHandle,
    StageHandles, StageStatus,
};

/// Every collaborator the pipeline drives, exclusively owned.
pub struct PipelineHardware {
    pub power: Box<dyn PowerController>,
    pub transport: Box<dyn SensorTransport>,
    pub sensor: Box<dyn SensorController>,
    pub buffers: Box<dyn BufferEngine>,
    pub demosaic: Box<dyn RegisterBlock>,
    pub gamma: Box<dyn RegisterBlock>,
    pub scaler: Box<dyn Subsystem>,
    pub catalog: Box<dyn VideoModeCatalog + Send>,
}

impl From<VirtualRig> for PipelineHardware {
    /// Wire a virtual rig against the built-in timing catalog.
    fn from(rig: VirtualRig) -> Self {
        Self {
            power: Box::new(rig.power),
            transport: Box::new(rig.transport),
            sensor: Box::new(rig.sensor),
            buffers: Box::new(rig.buffers),
            demosaic: Box::new(rig.demosaic),
            gamma: Box::new(rig.gamma),
            scaler: Box::new(rig.scaler),
            catalog: Box::new(StandardCatalog::new()),
        }
    }
}

/// Where the last `init()` left the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Uninitialized,
    Failed { stage: Stage, error: PipelineError },
    Connected,
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::Failed { .. } => "failed",
            PipelineState::Connected => "connected",
        }
    }
}

/// Summary of a successful bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connected {
    pub bayer_phase: BayerPhase,
    pub input: VideoStreamDescriptor,
    pub output: VideoStreamDescriptor,
    pub scaler: SubsystemConfig,
}

/// What a bring-up run learned before it stopped.
#[derive(Default)]
struct Progress {
    sensor: Option<SensorDescriptor>,
    streams: Option<(VideoStreamDescriptor, VideoStreamDescriptor)>,
}

/// Runs one step at a time: logging, timing and handle bookkeeping around each.
struct Sequencer<'a> {
    metrics: &'a BringupMetrics,
    handles: &'a mut StageHandles,
}

impl Sequencer<'_> {
    fn run<T>(
        &mut self,
        stage: Stage,
        step: impl FnOnce() -> Result<T, PipelineError>,
    ) -> Result<T, (Stage, PipelineError)> {
        debug!(stage = %stage, "stage starting");
        let started = Instant::now();
        let result = step();
        let elapsed = started.elapsed();
        self.metrics.record(stage, elapsed);
        match result {
            Ok(value) => {
                self.handles.mark(stage, StageHandles::settled_status(stage));
                info!(stage = %stage, elapsed_us = elapsed.as_micros() as u64, "stage ready");
                Ok(value)
            }
            Err(err) => {
                self.handles.fault(stage, &err);
                error!(stage = %stage, code = err.code(), error = %err, "stage failed");
                Err((stage, err))
            }
        }
    }
}

/// Bring-up orchestrator for the capture → demosaic → gamma → scaler chain.
///
/// Owns every collaborator and stage handle. `init()` runs the sequence, stopping at the
/// first failure; `start()` begins streaming once the pipeline is connected.
///
/// # Example
/// ```rust
/// use vidpipe::prelude::*;
///
/// let rig = VirtualRig::new(DeviceId(0));
/// let log = rig.log.clone();
/// let mut pipe = VideoPipe::new(PipelineConfig::default(), rig.into()).unwrap();
///
/// let connected = pipe.init().unwrap();
/// assert_eq!(connected.bayer_phase, BayerPhase::Bggr);
/// assert!(pipe.is_connected());
///
/// pipe.start().unwrap();
/// assert_eq!(log.count(|c| matches!(c, HwCall::BufferStart)), 1);
/// ```
pub struct VideoPipe {
    config: PipelineConfig,
    hw: PipelineHardware,
    gamma_table: GammaTable,
    state: PipelineState,
    handles: StageHandles,
    sensor: Option<SensorDescriptor>,
    streams: Option<(VideoStreamDescriptor, VideoStreamDescriptor)>,
    metrics: BringupMetrics,
}

impl VideoPipe {
    /// Validate `config` and take ownership of the hardware. Nothing is touched yet.
    ///
    /// The LUT size is snapped with [`sanitized`](crate::config::VideoSettings::sanitized)
    /// before validation, so [`config`](Self::config) always returns a config that passes
    /// [`PipelineConfig::validate`]. A snapped size is logged as a warning.
    pub fn new(config: PipelineConfig, hw: PipelineHardware) -> Result<Self, PipelineError> {
        let requested = config.video.gamma.lut_size;
        let config = PipelineConfig {
            video: config.video.sanitized(),
            ..config
        };
        if config.video.gamma.lut_size != requested {
            warn!(
                requested,
                applied = config.video.gamma.lut_size,
                "gamma LUT size snapped to a power of two within one channel window"
            );
        }
        config.validate()?;
        let gamma_table =
            GammaTable::compute(config.video.gamma.lut_size, config.video.gamma.exponent)
                .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            handles: StageHandles::from_config(&config),
            config,
            hw,
            gamma_table,
            state: PipelineState::Uninitialized,
            sensor: None,
            streams: None,
            metrics: BringupMetrics::default(),
        })
    }

    /// Run the full bring-up sequence.
    ///
    /// Blocks already configured when a later stage fails are left as they are. Calling
    /// again re-runs every stage from the top.
    pub fn init(&mut self) -> Result<Connected, PipelineError> {
        if self.state != PipelineState::Uninitialized {
            warn!(state = self.state.name(), "re-running bring-up over live hardware");
        }
        self.state = PipelineState::Uninitialized;
        self.handles = StageHandles::from_config(&self.config);
        self.sensor = None;
        self.streams = None;
        self.metrics.note_init();
        self.metrics.reset(&Stage::ALL[..Stage::ALL.len() - 1]);

        let mut progress = Progress::default();
        let mut seq = Sequencer {
            metrics: &self.metrics,
            handles: &mut self.handles,
        };
        let outcome = bring_up(
            &mut self.hw,
            &self.config,
            &self.gamma_table,
            &mut seq,
            &mut progress,
        );
        self.sensor = progress.sensor;
        self.streams = progress.streams;

        match outcome {
            Ok(connected) => {
                self.state = PipelineState::Connected;
                info!(
                    input = %self.config.video.input,
                    output = %self.config.video.output,
                    "pipeline connected"
                );
                Ok(connected)
            }
            Err((stage, err)) => {
                self.metrics.note_init_failure();
                self.state = PipelineState::Failed {
                    stage,
                    error: err.clone(),
                };
                Err(err)
            }
        }
    }

    /// Begin sensor streaming, then enable DMA transfer.
    ///
    /// Rejected without touching hardware unless the pipeline is connected. Whether a
    /// sensor `configure` failure aborts is governed by [`StartPolicy`].
    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.metrics.note_start();
        if self.state != PipelineState::Connected {
            let err = PipelineError::PreconditionFault {
                action: "start",
                state: self.state.name(),
            };
            error!(code = err.code(), error = %err, "start rejected");
            return Err(err);
        }
        self.metrics.reset(&[Stage::Stream]);

        let started = Instant::now();
        let result = self.stream_on();
        let elapsed = started.elapsed();
        self.metrics.record(Stage::Stream, elapsed);

        match &result {
            Ok(()) => info!(elapsed_us = elapsed.as_micros() as u64, "streaming"),
            Err(err) => error!(
                stage = Stage::Stream.name(),
                code = err.code(),
                error = %err,
                "start failed"
            ),
        }
        result
    }

    fn stream_on(&mut self) -> Result<(), PipelineError> {
        if let Err(cause) = self.hw.sensor.configure() {
            let err = PipelineError::SensorStreamFault(cause);
            self.handles.fault(Stage::Sensor, &err);
            match self.config.video.start_policy {
                StartPolicy::Strict => return Err(err),
                StartPolicy::BestEffort => {
                    warn!(error = %err, "sensor did not acknowledge stream start")
                }
            }
        } else {
            self.handles.mark(Stage::Sensor, StageStatus::Started);
        }

        if let Err(err) = CaptureBufferManager::new(&mut *self.hw.buffers).start() {
            self.handles.fault(Stage::CaptureBuffers, &err);
            return Err(err);
        }
        self.handles.mark(Stage::CaptureBuffers, StageStatus::Started);
        Ok(())
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == PipelineState::Connected
    }

    /// Descriptor from the last successful detection.
    pub fn sensor(&self) -> Option<&SensorDescriptor> {
        self.sensor.as_ref()
    }

    /// Negotiated `(input, output)` descriptors.
    pub fn streams(&self) -> Option<(VideoStreamDescriptor, VideoStreamDescriptor)> {
        self.streams
    }

    pub fn stage_handles(&self) -> &[StageHandle] {
        self.handles.as_slice()
    }

    /// First handle of `stage`. Use [`buffer_handle`](Self::buffer_handle) to reach the
    /// read engine.
    pub fn handle(&self, stage: Stage) -> Option<&StageHandle> {
        self.handles.get(stage)
    }

    /// Handle of the write or read frame-buffer engine.
    pub fn buffer_handle(&self, side: BufferSide) -> Option<&StageHandle> {
        self.handles.engine(side)
    }

    /// Table loaded into each gamma channel window.
    pub fn gamma_table(&self) -> &GammaTable {
        &self.gamma_table
    }

    pub fn metrics(&self) -> &BringupMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

fn bring_up(
    hw: &mut PipelineHardware,
    config: &PipelineConfig,
    gamma_table: &GammaTable,
    seq: &mut Sequencer<'_>,
    progress: &mut Progress,
) -> Result<Connected, (Stage, PipelineError)> {
    let video = &config.video;

    seq.run(Stage::Power, || {
        hw.power
            .initialize(config.power.device)
            .map_err(PipelineError::PowerFault)?;
        hw.power.enable().map_err(PipelineError::PowerFault)?;
        if !hw.power.read_presence() {
            warn!("presence line low after power enable; continuing to detection");
        }
        Ok(())
    })?;

    let transport = seq.run(Stage::Transport, || {
        hw.transport
            .init(
                config.transport.device,
                config.transport.irq(config.interrupt_controller),
            )
            .map_err(PipelineError::TransportFault)
    })?;

    let sensor = seq.run(Stage::Sensor, || {
        hw.sensor
            .detect(transport)
            .map_err(PipelineError::SensorNotFound)
    })?;
    info!(
        model = %sensor.model.name,
        chip_id = sensor.model.chip_id,
        bayer = %sensor.bayer_phase,
        "sensor detected"
    );
    if !sensor.supports(&video.input) {
        warn!(
            requested = %video.input,
            model = %sensor.model.name,
            "sensor does not advertise the requested input mode"
        );
    }
    progress.sensor = Some(sensor);

    seq.run(Stage::CaptureBuffers, || {
        CaptureBufferManager::new(&mut *hw.buffers).init(
            config.interrupt_controller,
            &config.frame_buffer_write,
            &config.frame_buffer_read,
            config.frame_buffer_region,
        )
    })?;

    let frame = video.input.resolution;
    let bayer_phase = seq.run(Stage::Demosaic, || {
        let phase = hw.sensor.bayer_phase();
        DemosaicStage::new(&mut *hw.demosaic, config.demosaic.device)
            .configure(frame, phase)?;
        Ok(phase)
    })?;

    seq.run(Stage::Gamma, || {
        GammaStage::new(&mut *hw.gamma, config.gamma.device).configure(
            frame,
            video.color_format,
            gamma_table,
        )
    })?;

    let scaler = seq.run(Stage::Scaler, || {
        ScalerSubsystem::new(&mut *hw.scaler).bind(config.scaler)
    })?;
    seq.handles.set_base(Stage::Scaler, scaler.base_address);

    let (input, output) = seq.run(Stage::StreamFormat, || {
        let negotiator = StreamFormatNegotiator::new(&*hw.catalog);
        let derive = |geometry| {
            negotiator.derive(
                geometry,
                video.color_format,
                scaler.color_depth,
                scaler.pixels_per_clock,
            )
        };
        Ok((derive(video.input)?, derive(video.output)?))
    })?;
    debug!(input = %input.mode, output = %output.mode, "stream modes resolved");
    progress.streams = Some((input, output));

    seq.run(Stage::Scaler, || {
        ScalerSubsystem::new(&mut *hw.scaler).commit(&input, &output)
    })?;

    Ok(Connected {
        bayer_phase,
        input,
        output,
        scaler,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VideoSettings;
    use vidpipe_hal::prelude::*;

    fn pipe(rig: &VirtualRig) -> VideoPipe {
        VideoPipe::new(PipelineConfig::default(), rig.clone().into()).unwrap()
    }

    #[test]
    fn new_rejects_bad_gamma_before_touching_hardware() {
        let rig = VirtualRig::new(DeviceId(0));
        let cfg = PipelineConfig::new().video(VideoSettings::new().gamma(0.0, 256));
        let err = VideoPipe::new(cfg, rig.clone().into()).err().unwrap();
        assert_eq!(err.code(), "invalid_config");
        assert!(rig.log.is_empty());
    }

    #[test]
    fn new_snaps_lut_size() {
        let rig = VirtualRig::new(DeviceId(0));
        let cfg = PipelineConfig::new().video(VideoSettings::new().gamma(0.5, 700));
        let pipe = VideoPipe::new(cfg, rig.into()).unwrap();
        assert_eq!(pipe.config().video.gamma.lut_size, 1024);
        assert_eq!(pipe.gamma_table().len(), 1024);
    }

    #[test]
    fn applied_config_passes_validation_after_snapping() {
        let rig = VirtualRig::new(DeviceId(0));
        let cfg = PipelineConfig::new().video(VideoSettings::new().gamma(0.5, 2048));
        assert!(cfg.validate().is_err());
        let pipe = VideoPipe::new(cfg, rig.into()).unwrap();
        assert_eq!(pipe.config().video.gamma.lut_size, 1024);
        pipe.config().validate().unwrap();
    }

    #[test]
    fn read_engine_fault_leaves_write_engine_configured() {
        let rig = VirtualRig::new(DeviceId(0));
        rig.faults.inject(FaultPoint::BufferInitRead, HwError::NoResponse);
        let mut pipe = pipe(&rig);
        pipe.init().unwrap_err();
        assert_eq!(
            pipe.buffer_handle(BufferSide::Write).unwrap().status(),
            StageStatus::Configured
        );
        assert_eq!(
            pipe.buffer_handle(BufferSide::Read).unwrap().status(),
            StageStatus::Faulted("buffer_fault")
        );
    }

    #[test]
    fn handles_follow_the_sequence() {
        let rig = VirtualRig::new(DeviceId(0));
        let mut pipe = pipe(&rig);
        pipe.init().unwrap();
        let status = |stage| pipe.handle(stage).unwrap().status();
        assert_eq!(status(Stage::Power), StageStatus::Configured);
        assert_eq!(status(Stage::Demosaic), StageStatus::Started);
        assert_eq!(status(Stage::Gamma), StageStatus::Started);
        assert_eq!(status(Stage::CaptureBuffers), StageStatus::Configured);
        assert_eq!(
            pipe.handle(Stage::Scaler).unwrap().base_address(),
            Some(0xA004_0000)
        );

        pipe.start().unwrap();
        assert_eq!(pipe.handle(Stage::Sensor).unwrap().status(), StageStatus::Started);
        assert_eq!(
            pipe.handle(Stage::CaptureBuffers).unwrap().status(),
            StageStatus::Started
        );
    }

    #[test]
    fn failing_stage_handle_records_code() {
        let rig = VirtualRig::new(DeviceId(0));
        rig.faults.inject(FaultPoint::GammaInit, HwError::Status(-1));
        let mut pipe = pipe(&rig);
        pipe.init().unwrap_err();
        assert_eq!(
            pipe.handle(Stage::Gamma).unwrap().status(),
            StageStatus::Faulted("stage_fault")
        );
        assert_eq!(pipe.handle(Stage::Scaler).unwrap().status(), StageStatus::Idle);
        assert_eq!(pipe.metrics().init_failures(), 1);
    }

    #[test]
    fn metrics_cover_reached_stages_only() {
        let rig = VirtualRig::new(DeviceId(0));
        rig.faults
            .inject(FaultPoint::BufferInitWrite, HwError::Status(-12));
        let mut pipe = pipe(&rig);
        pipe.init().unwrap_err();
        assert!(pipe.metrics().last(Stage::Sensor).is_some());
        assert!(pipe.metrics().last(Stage::CaptureBuffers).is_some());
        assert!(pipe.metrics().last(Stage::Demosaic).is_none());
        assert_eq!(pipe.metrics().init_attempts(), 1);
    }
}
