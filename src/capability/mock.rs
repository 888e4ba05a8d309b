//! Mock capability probe for testing
//!
//! Reports scripted GPU facts and counts how many contexts were opened
//! and disposed, so tests can check that probing never leaks a context.

use super::{CapabilityProbe, ProbeContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock probe returning fixed GPU facts
#[derive(Clone, Debug)]
pub struct MockProbe {
    renderer: Option<String>,
    max_texture_size: u32,
    secondary_api: bool,
    supported: bool,
    opened: Arc<AtomicUsize>,
    disposed: Arc<AtomicUsize>,
}

impl MockProbe {
    /// A probe reporting the given renderer string
    pub fn with_renderer(renderer: impl Into<String>) -> Self {
        Self {
            renderer: Some(renderer.into()),
            ..Self::capable()
        }
    }

    /// A probe with no renderer string and modern limits
    pub fn capable() -> Self {
        Self {
            renderer: None,
            max_texture_size: 16384,
            secondary_api: true,
            supported: true,
            opened: Arc::new(AtomicUsize::new(0)),
            disposed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A probe that cannot create any 3D context
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::capable()
        }
    }

    /// Override the reported texture limit and secondary API support
    pub fn with_limits(mut self, max_texture_size: u32, secondary_api: bool) -> Self {
        self.max_texture_size = max_texture_size;
        self.secondary_api = secondary_api;
        self
    }

    /// Number of contexts opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of contexts disposed so far
    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Context handed out by [`MockProbe`]
#[derive(Debug)]
pub struct MockProbeContext {
    renderer: Option<String>,
    max_texture_size: u32,
    secondary_api: bool,
    disposed: Arc<AtomicUsize>,
}

impl ProbeContext for MockProbeContext {
    fn renderer(&self) -> Option<String> {
        self.renderer.clone()
    }

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn supports_secondary_api(&self) -> bool {
        self.secondary_api
    }

    fn dispose(self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

impl CapabilityProbe for MockProbe {
    type Context = MockProbeContext;

    fn open_context(&self) -> Option<Self::Context> {
        if !self.supported {
            return None;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Some(MockProbeContext {
            renderer: self.renderer.clone(),
            max_texture_size: self.max_texture_size,
            secondary_api: self.secondary_api,
            disposed: Arc::clone(&self.disposed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityAssessor, GpuTier, HostHints};

    #[test]
    fn test_context_disposed_after_assess() {
        let probe = MockProbe::with_renderer("NVIDIA GeForce RTX 4090");
        let assessment = CapabilityAssessor::new().assess(&probe, &HostHints::default());

        assert_eq!(assessment.gpu_tier, GpuTier::High);
        assert_eq!(probe.opened(), 1);
        assert_eq!(probe.disposed(), 1);
    }

    #[test]
    fn test_unsupported_opens_nothing() {
        let probe = MockProbe::unsupported();
        let assessment = CapabilityAssessor::new().assess(&probe, &HostHints::default());

        assert_eq!(assessment.gpu_tier, GpuTier::Unsupported);
        assert_eq!(probe.opened(), 0);
    }

    #[test]
    fn test_unknown_capable_gpu_is_not_unsupported() {
        let probe = MockProbe::with_renderer("Mystery Accelerator X1");
        let assessment = CapabilityAssessor::new().assess(&probe, &HostHints::default());
        assert_eq!(assessment.gpu_tier, GpuTier::Medium);

        let weak = MockProbe::capable().with_limits(4096, false);
        let assessment = CapabilityAssessor::new().assess(&weak, &HostHints::default());
        assert_eq!(assessment.gpu_tier, GpuTier::Low);
    }
}
