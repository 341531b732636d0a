use vidpipe::prelude::*;

fn main() -> Result<(), PipelineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vidpipe=debug")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    // Scale the sensor's 1080p30 down to 720p30 with a slightly stronger tone curve.
    let video = VideoSettings::new()
        .output(StreamGeometry::new(1280, 720, 30).expect("non-zero geometry"))
        .gamma(0.45, 1024);
    let config = PipelineConfig::new().video(video);

    let rig = VirtualRig::new(config.scaler);
    let log = rig.log.clone();
    let mut pipe = VideoPipe::new(config, rig.into())?;

    let connected = pipe.init()?;
    println!(
        "connected: bayer={} in={}x{} out={}x{} ({} bpc, {} ppc)",
        connected.bayer_phase,
        connected.input.timing.h_active,
        connected.input.timing.v_active,
        connected.output.timing.h_active,
        connected.output.timing.v_active,
        connected.scaler.color_depth.bits(),
        connected.scaler.pixels_per_clock.count(),
    );

    pipe.start()?;

    for handle in pipe.stage_handles() {
        let base = handle
            .base_address()
            .map(|b| format!("{b:#010x}"))
            .unwrap_or_else(|| "-".into());
        let name = match handle.side() {
            Some(side) => format!("{}/{side}", handle.stage()),
            None => handle.stage().to_string(),
        };
        println!(
            "{name:<22} base={base:<12} status={:?} took={:.3?}ms",
            handle.status(),
            pipe.metrics().last_millis(handle.stage()),
        );
    }
    println!("{} hardware calls recorded", log.len());
    Ok(())
}
