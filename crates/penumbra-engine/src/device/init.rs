/// Construction parameters for [`super::WgpuContext`].
///
/// Kept `Clone` so a context factory can rebuild the device after a loss with
/// identical settings.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior).
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub power_preference: wgpu::PowerPreference,

    /// Use the software adapter when one exists.
    pub force_fallback_adapter: bool,

    /// Required wgpu features. An empty set keeps the widest adapter coverage.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    ///
    /// The per-tile uniform block is bounded by `max_uniform_buffer_binding_size`,
    /// which caps the sum of all array capacities of one variant.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface. A hint.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}
