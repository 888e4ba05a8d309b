//! Simulated session for archetype_tier
//!
//! Assesses a mock device, loads its tier, then renders frames that get
//! slower over time so the controller steps down.
//!
//! Run with: RUST_LOG=info cargo run --example simulated_session --features runtime-tokio

use archetype_tier::{
    ConnectionHint, FrameTick, HostHints, MockGpu, MockLoader, MockProbe, TierController,
    TierUpdate, TokioRuntime,
};
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("archetype_tier Simulated Session");
    println!("================================\n");

    let controller =
        TierController::with_defaults(MockGpu::new(), MockLoader::new(), TokioRuntime::new())?;

    let _subscription = controller.subscribe(
        |update| match update {
            TierUpdate::Ready { tier, handle, cause } => {
                println!("-> rendering {} ({})", tier, handle.path());
                if let Some(event) = cause {
                    println!("   stepped down from {} ({:?})", event.previous_tier, event.reason);
                }
            }
            TierUpdate::NoRendering => println!("-> no 3D on this device"),
        },
        |err| println!("!! falling back to a static image: {}", err),
    );
    controller.on_warning(|w| println!("   warning: {:?} {:.1} vs {:.1}", w.indicator, w.observed, w.threshold));

    let probe = MockProbe::with_renderer("ANGLE (NVIDIA, NVIDIA GeForce RTX 3060 Direct3D11)");
    let hints = HostHints {
        device_memory_gb: Some(8.0),
        connection: Some(ConnectionHint {
            effective_type: Some("4g".into()),
            downlink_mbps: Some(10.0),
        }),
        ..HostHints::default()
    };

    let tier = controller.start(&probe, &hints).await?;
    println!("Initial tier: {:?}\n", tier);

    // Simulated clock: 12 seconds of frames whose cost grows steadily
    let start = Instant::now();
    let mut at = start;
    for frame in 0..720u32 {
        let render_ms = 6.0 + frame as f32 * 0.08;
        let interval_ms = render_ms.max(16.7);
        at += Duration::from_secs_f32(interval_ms / 1000.0);
        controller.on_tick(
            FrameTick::new(at, Duration::from_secs_f32(render_ms / 1000.0))
                .with_memory(250.0 + frame as f64 * 0.5),
        );
        // Let spawned transitions run
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("\nFinal tier: {:?}", controller.current_tier());
    println!("Stats: {}", serde_json::to_string_pretty(&controller.stats())?);

    controller.dispose();
    Ok(())
}
