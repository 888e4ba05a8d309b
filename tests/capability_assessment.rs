//! Integration tests for capability assessment and tier recommendation

use archetype_tier::{
    CapabilityAssessment, CapabilityAssessor, ConnectionHint, DeviceClass, GpuTier, HostHints,
    MockProbe, NetworkClass, QualityTier, Recommendation,
};
use proptest::prelude::*;

fn assessment(
    gpu_tier: GpuTier,
    device_class: DeviceClass,
    memory_mb: u32,
    network: NetworkClass,
) -> CapabilityAssessment {
    CapabilityAssessment {
        gpu_tier,
        renderer: None,
        memory_mb,
        network,
        device_class,
    }
}

#[test]
fn test_mobile_cap_applies_to_strong_hardware() {
    let a = assessment(GpuTier::High, DeviceClass::Phone, 4096, NetworkClass::Fast);
    assert!(a.is_mobile());
    assert_eq!(a.recommended_tier(), Recommendation::Tier(QualityTier::Medium));
}

#[test]
fn test_desktop_low_gpu_is_low_regardless_of_memory() {
    for memory_mb in [1024, 4096, 32768] {
        for network in [NetworkClass::Fast, NetworkClass::Medium, NetworkClass::Unknown] {
            let a = assessment(GpuTier::Low, DeviceClass::Desktop, memory_mb, network);
            assert_eq!(a.recommended_tier(), Recommendation::Tier(QualityTier::Low));
        }
    }
}

#[test]
fn test_unsupported_gpu_means_no_rendering() {
    let probe = MockProbe::unsupported();
    let a = CapabilityAssessor::new().assess(&probe, &HostHints::default());
    assert_eq!(a.gpu_tier, GpuTier::Unsupported);
    assert_eq!(a.recommended_tier(), Recommendation::NoRendering);
    assert_eq!(a.recommended_tier().tier(), None);
}

#[test]
fn test_probe_context_is_always_disposed() {
    for probe in [
        MockProbe::with_renderer("NVIDIA GeForce RTX 4080"),
        MockProbe::with_renderer("Totally Unknown GPU 9000"),
        MockProbe::capable().with_limits(4096, false),
    ] {
        CapabilityAssessor::new().assess(&probe, &HostHints::default());
        assert_eq!(probe.opened(), 1);
        assert_eq!(probe.disposed(), 1);
    }
}

#[test]
fn test_unknown_capable_gpu_is_never_unsupported() {
    let probe = MockProbe::with_renderer("Prototype Graphics Core").with_limits(16384, true);
    let a = CapabilityAssessor::new().assess(&probe, &HostHints::default());
    assert_eq!(a.gpu_tier, GpuTier::Medium);

    let weak = MockProbe::with_renderer("Prototype Graphics Core").with_limits(2048, false);
    let a = CapabilityAssessor::new().assess(&weak, &HostHints::default());
    assert_eq!(a.gpu_tier, GpuTier::Low);
}

#[test]
fn test_hints_flow_into_assessment() {
    let hints = HostHints {
        device_memory_gb: Some(2.0),
        connection: Some(ConnectionHint {
            effective_type: Some("2g".into()),
            downlink_mbps: Some(0.2),
        }),
        device_class: None,
        user_agent: Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile".into()),
    };
    let probe = MockProbe::with_renderer("Apple GPU");
    let a = CapabilityAssessor::new().assess(&probe, &hints);

    assert_eq!(a.device_class, DeviceClass::Phone);
    assert_eq!(a.memory_mb, 2048);
    assert_eq!(a.network, NetworkClass::Slow);
    // Medium GPU on mobile caps at low; slow network steps once more
    assert_eq!(a.recommended_tier(), Recommendation::Tier(QualityTier::UltraLow));
}

fn gpu_tier() -> impl Strategy<Value = GpuTier> {
    prop_oneof![
        Just(GpuTier::Low),
        Just(GpuTier::Medium),
        Just(GpuTier::High),
        Just(GpuTier::Unsupported)
    ]
}

fn device_class() -> impl Strategy<Value = DeviceClass> {
    prop_oneof![
        Just(DeviceClass::Phone),
        Just(DeviceClass::Tablet),
        Just(DeviceClass::Desktop)
    ]
}

proptest! {
    #[test]
    fn prop_slow_network_is_exactly_one_step_down(
        gpu in gpu_tier(),
        class in device_class(),
        memory_mb in 512u32..16384,
    ) {
        let a = assessment(gpu, class, memory_mb, NetworkClass::Slow);
        match a.network_agnostic_tier() {
            Recommendation::NoRendering => {
                prop_assert_eq!(a.recommended_tier(), Recommendation::NoRendering);
            }
            Recommendation::Tier(base) => {
                let expected = base.lower().unwrap_or(QualityTier::UltraLow);
                prop_assert_eq!(a.recommended_tier(), Recommendation::Tier(expected));
            }
        }
    }

    #[test]
    fn prop_mobile_never_exceeds_medium(
        gpu in gpu_tier(),
        memory_mb in 512u32..16384,
    ) {
        let a = assessment(gpu, DeviceClass::Tablet, memory_mb, NetworkClass::Fast);
        if let Some(tier) = a.recommended_tier().tier() {
            prop_assert!(tier <= QualityTier::Medium);
        }
    }
}
