//! Device capability assessment
//!
//! Probes the GPU through a throwaway [`ProbeContext`], folds in the optional
//! host hints (device memory, connection, device class) and produces an
//! immutable [`CapabilityAssessment`] together with a tier recommendation.
//!
//! Nothing here is cached: every call to [`CapabilityAssessor::assess`]
//! probes again.

pub mod gpu_table;
pub mod mock;

use serde::{Deserialize, Serialize};

use crate::tier::{QualityTier, Recommendation};

/// Below this much memory a mobile device steps down one tier
pub const MOBILE_MEMORY_FLOOR_MB: u32 = 3000;
/// Below this much memory a desktop steps down one tier
pub const DESKTOP_MEMORY_FLOOR_MB: u32 = 4096;

/// GPU capability bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuTier {
    Low,
    Medium,
    High,
    /// No 3D context could be created at all
    Unsupported,
}

/// Connection quality bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkClass {
    Slow,
    Medium,
    Fast,
    Unknown,
}

/// Form factor of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Phone,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn is_mobile(self) -> bool {
        matches!(self, Self::Phone | Self::Tablet)
    }

    /// Memory assumed when the host gives no hint
    pub fn default_memory_mb(self) -> u32 {
        match self {
            Self::Phone => 2048,
            Self::Tablet => 3072,
            Self::Desktop => 8192,
        }
    }

    /// Best-effort form factor from a user agent string
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("iPad") || user_agent.contains("Tablet") {
            Self::Tablet
        } else if user_agent.contains("Mobi")
            || user_agent.contains("Android")
            || user_agent.contains("iPhone")
        {
            Self::Phone
        } else {
            Self::Desktop
        }
    }
}

/// Connection information reported by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionHint {
    /// Effective connection type such as `"4g"` or `"slow-2g"`
    pub effective_type: Option<String>,
    /// Estimated downlink bandwidth in Mbps
    pub downlink_mbps: Option<f32>,
}

/// Optional facts the host platform may know about the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostHints {
    /// Approximate device memory in gigabytes
    pub device_memory_gb: Option<f32>,
    pub connection: Option<ConnectionHint>,
    /// Explicit form factor; takes precedence over the user agent
    pub device_class: Option<DeviceClass>,
    pub user_agent: Option<String>,
}

impl HostHints {
    fn device_class(&self) -> DeviceClass {
        self.device_class
            .or_else(|| self.user_agent.as_deref().map(DeviceClass::from_user_agent))
            .unwrap_or(DeviceClass::Desktop)
    }

    fn memory_mb(&self, class: DeviceClass) -> u32 {
        match self.device_memory_gb {
            Some(gb) if gb.is_finite() && gb > 0.0 => (gb * 1024.0).round() as u32,
            _ => class.default_memory_mb(),
        }
    }

    fn network_class(&self) -> NetworkClass {
        let Some(connection) = &self.connection else {
            return NetworkClass::Unknown;
        };
        let downlink = connection.downlink_mbps.filter(|d| d.is_finite() && *d >= 0.0);

        match connection.effective_type.as_deref() {
            Some("slow-2g") | Some("2g") => NetworkClass::Slow,
            Some("3g") => match downlink {
                Some(d) if d < 1.0 => NetworkClass::Slow,
                _ => NetworkClass::Medium,
            },
            Some("4g") => match downlink {
                Some(d) if d < 2.0 => NetworkClass::Medium,
                _ => NetworkClass::Fast,
            },
            _ => match downlink {
                Some(d) if d >= 5.0 => NetworkClass::Fast,
                Some(d) if d >= 1.5 => NetworkClass::Medium,
                Some(_) => NetworkClass::Slow,
                None => NetworkClass::Unknown,
            },
        }
    }
}

/// A short-lived rendering context used only to read GPU facts
pub trait ProbeContext {
    /// Unmasked renderer identifier, when the platform exposes one
    fn renderer(&self) -> Option<String>;

    /// Largest supported 2D texture dimension
    fn max_texture_size(&self) -> u32;

    /// Whether the newer graphics API generation is available
    fn supports_secondary_api(&self) -> bool;

    /// Release the context and everything it allocated
    fn dispose(self);
}

/// Source of probe contexts
pub trait CapabilityProbe {
    type Context: ProbeContext;

    /// Create a throwaway context, or `None` when 3D is unavailable
    fn open_context(&self) -> Option<Self::Context>;
}

/// Immutable result of one capability probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityAssessment {
    pub gpu_tier: GpuTier,
    pub renderer: Option<String>,
    pub memory_mb: u32,
    pub network: NetworkClass,
    pub device_class: DeviceClass,
}

impl CapabilityAssessment {
    pub fn is_mobile(&self) -> bool {
        self.device_class.is_mobile()
    }

    /// Recommendation from hardware alone, before the network step-down
    pub fn network_agnostic_tier(&self) -> Recommendation {
        let mobile = self.is_mobile();
        let base = match (self.gpu_tier, mobile) {
            (GpuTier::Unsupported, _) => return Recommendation::NoRendering,
            (GpuTier::High, false) => QualityTier::High,
            (GpuTier::Medium, false) => QualityTier::Medium,
            (GpuTier::Low, false) => QualityTier::Low,
            // Mobile is capped at medium whatever the GPU
            (GpuTier::High, true) => QualityTier::Medium,
            (GpuTier::Medium, true) => QualityTier::Low,
            (GpuTier::Low, true) => QualityTier::UltraLow,
        };

        let floor = if mobile {
            MOBILE_MEMORY_FLOOR_MB
        } else {
            DESKTOP_MEMORY_FLOOR_MB
        };
        let tier = if self.memory_mb < floor && base > QualityTier::Low {
            base.step_down()
        } else {
            base
        };
        Recommendation::Tier(tier)
    }

    /// Final recommendation, including the slow-network step-down
    pub fn recommended_tier(&self) -> Recommendation {
        match self.network_agnostic_tier() {
            Recommendation::Tier(tier) if self.network == NetworkClass::Slow => {
                Recommendation::Tier(tier.step_down())
            }
            other => other,
        }
    }
}

/// Runs the one-shot capability probe
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityAssessor;

impl CapabilityAssessor {
    pub fn new() -> Self {
        Self
    }

    /// Probe the device and combine the result with the host hints.
    ///
    /// The probe context is always disposed before this returns.
    pub fn assess<P: CapabilityProbe + ?Sized>(
        &self,
        probe: &P,
        hints: &HostHints,
    ) -> CapabilityAssessment {
        let (gpu_tier, renderer) = match probe.open_context() {
            Some(context) => {
                let renderer = context.renderer();
                let tier = renderer
                    .as_deref()
                    .and_then(gpu_table::classify_renderer)
                    .unwrap_or_else(|| {
                        gpu_table::classify_by_capability(
                            context.max_texture_size(),
                            context.supports_secondary_api(),
                        )
                    });
                context.dispose();
                (tier, renderer)
            }
            None => (GpuTier::Unsupported, None),
        };

        let device_class = hints.device_class();
        let assessment = CapabilityAssessment {
            gpu_tier,
            renderer,
            memory_mb: hints.memory_mb(device_class),
            network: hints.network_class(),
            device_class,
        };

        log::debug!(
            "Capability assessment: gpu={:?} renderer={:?} memory={}MB network={:?} device={:?}",
            assessment.gpu_tier,
            assessment.renderer,
            assessment.memory_mb,
            assessment.network,
            assessment.device_class
        );
        assessment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(effective_type: Option<&str>, downlink: Option<f32>) -> HostHints {
        HostHints {
            connection: Some(ConnectionHint {
                effective_type: effective_type.map(str::to_string),
                downlink_mbps: downlink,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_network_classification() {
        assert_eq!(HostHints::default().network_class(), NetworkClass::Unknown);
        assert_eq!(
            connection(Some("slow-2g"), None).network_class(),
            NetworkClass::Slow
        );
        assert_eq!(
            connection(Some("3g"), Some(0.4)).network_class(),
            NetworkClass::Slow
        );
        assert_eq!(
            connection(Some("3g"), None).network_class(),
            NetworkClass::Medium
        );
        assert_eq!(
            connection(Some("4g"), Some(10.0)).network_class(),
            NetworkClass::Fast
        );
        assert_eq!(
            connection(Some("4g"), Some(1.2)).network_class(),
            NetworkClass::Medium
        );
        assert_eq!(
            connection(None, Some(0.5)).network_class(),
            NetworkClass::Slow
        );
        assert_eq!(connection(None, None).network_class(), NetworkClass::Unknown);
    }

    #[test]
    fn test_memory_defaults_by_device_class() {
        let hints = HostHints::default();
        assert_eq!(hints.memory_mb(DeviceClass::Phone), 2048);
        assert_eq!(hints.memory_mb(DeviceClass::Tablet), 3072);
        assert_eq!(hints.memory_mb(DeviceClass::Desktop), 8192);

        let hints = HostHints {
            device_memory_gb: Some(4.0),
            ..Default::default()
        };
        assert_eq!(hints.memory_mb(DeviceClass::Phone), 4096);
    }

    #[test]
    fn test_user_agent_sniffing() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148";
        let ipad = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)";
        let desktop = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/120.0";
        assert_eq!(DeviceClass::from_user_agent(iphone), DeviceClass::Phone);
        assert_eq!(DeviceClass::from_user_agent(ipad), DeviceClass::Tablet);
        assert_eq!(DeviceClass::from_user_agent(desktop), DeviceClass::Desktop);
    }

    #[test]
    fn test_explicit_device_class_wins() {
        let hints = HostHints {
            device_class: Some(DeviceClass::Desktop),
            user_agent: Some("Android Mobi".to_string()),
            ..Default::default()
        };
        assert_eq!(hints.device_class(), DeviceClass::Desktop);
    }

    #[test]
    fn test_low_memory_desktop_steps_down() {
        let assessment = CapabilityAssessment {
            gpu_tier: GpuTier::High,
            renderer: None,
            memory_mb: 2048,
            network: NetworkClass::Fast,
            device_class: DeviceClass::Desktop,
        };
        assert_eq!(
            assessment.recommended_tier(),
            Recommendation::Tier(QualityTier::Medium)
        );
    }
}
