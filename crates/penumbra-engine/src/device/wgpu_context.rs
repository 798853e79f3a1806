use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{Context, Result};
use slotmap::SlotMap;
use winit::window::Window;

use crate::coords::Vec2;

use super::surface;
use super::{
    BlendMode, CanvasSize, Capabilities, ColorTarget, CompileMessage, ContextInfo,
    ContextLossSignal, FeatureLevel, GlobalUniforms, GpuContext, GpuError, GpuInit, HardwareInfo,
    PassRequest, PassTarget, ProgramId, ProgramSource, ProgramStatus, ShaderStage,
    SurfaceErrorAction, TexelFormat, TextureDesc, TextureId,
};

/// [`GpuContext`] backed by wgpu and a winit window surface.
///
/// Programs are validated with naga one stage per status poll, so a batch of
/// variants compiles incrementally across frames when the adapter is capable.
/// Pipelines are created on the first poll after linking was requested.
pub struct WgpuContext {
    window: Arc<Window>,
    _instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    _adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    info: ContextInfo,
    loss: ContextLossSignal,
    filterable: bool,
    sampler: wgpu::Sampler,

    programs: SlotMap<ProgramId, ProgramSlot>,
    textures: SlotMap<TextureId, TextureSlot>,
    layouts: HashMap<u32, PassLayouts>,
    streams: HashMap<String, PassBuffers>,
    frame: Option<WgpuFrame>,
}

struct ProgramSlot {
    label: String,
    vertex: String,
    fragment: String,
    texture_count: u32,
    targets: Vec<ColorTarget>,
    blend: BlendMode,
    link_requested: bool,
    state: ProgramState,
}

enum ProgramState {
    Validating(ShaderStage),
    Validated,
    Ready(wgpu::RenderPipeline),
    Failed(Vec<CompileMessage>),
    LinkFailed(String),
}

struct TextureSlot {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: TexelFormat,
}

struct PassLayouts {
    globals: wgpu::BindGroupLayout,
    blocks: wgpu::BindGroupLayout,
    pipeline: wgpu::PipelineLayout,
}

/// Per-pass streaming uniform buffers, reused across frames.
struct PassBuffers {
    globals: wgpu::Buffer,
    blocks: wgpu::Buffer,
    blocks_capacity: u64,
}

struct WgpuFrame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

impl WgpuContext {
    /// Creates a context bound to `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: init.force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("penumbra device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let loss = ContextLossSignal::new();
        {
            let loss = loss.clone();
            device.set_device_lost_callback(move |reason, message| {
                log::warn!("GPU device lost ({reason:?}): {message}");
                loss.mark_lost();
            });
        }

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&surface_caps, init.prefer_srgb)
            .context("no supported surface formats")?;
        let alpha_mode = surface::choose_alpha_mode(&surface_caps, init.alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        let info = probe_adapter(&adapter, &device);
        let caps = info.capabilities;
        let filterable = !caps.float_textures || caps.float_linear_filtering;
        let filter = if filterable {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("penumbra input sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        log::info!(
            "GPU context ready: {} ({}), {:?}, float targets: {}, parallel compile: {}",
            info.hardware.adapter,
            info.hardware.backend,
            caps.feature_level,
            caps.float_textures,
            caps.parallel_compile,
        );

        Ok(Self {
            window,
            _instance: instance,
            surface,
            _adapter: adapter,
            device,
            queue,
            config,
            info,
            loss,
            filterable,
            sampler,
            programs: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            layouts: HashMap::new(),
            streams: HashMap::new(),
            frame: None,
        })
    }

    #[inline]
    fn ensure_alive(&self) -> Result<(), GpuError> {
        if self.loss.is_lost() {
            Err(GpuError::ContextLost)
        } else {
            Ok(())
        }
    }

    fn ensure_layouts(&mut self, texture_count: u32) {
        if self.layouts.contains_key(&texture_count) {
            return;
        }
        let layouts = create_layouts(&self.device, texture_count, self.filterable);
        self.layouts.insert(texture_count, layouts);
    }

    /// Advances a program by one compilation step. Returns true if it progressed.
    fn step_program(&mut self, id: ProgramId) -> Result<bool, GpuError> {
        let slot = self.programs.get_mut(id).ok_or(GpuError::UnknownResource)?;
        let next = match &slot.state {
            ProgramState::Validating(ShaderStage::Vertex) => {
                match validate_wgsl(ShaderStage::Vertex, &slot.vertex) {
                    Ok(()) => ProgramState::Validating(ShaderStage::Fragment),
                    Err(messages) => ProgramState::Failed(messages),
                }
            }
            ProgramState::Validating(ShaderStage::Fragment) => {
                match validate_wgsl(ShaderStage::Fragment, &slot.fragment) {
                    Ok(()) => ProgramState::Validated,
                    Err(messages) => ProgramState::Failed(messages),
                }
            }
            ProgramState::Validated if slot.link_requested => {
                let layouts = self
                    .layouts
                    .get(&slot.texture_count)
                    .ok_or(GpuError::UnknownResource)?;
                let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
                let pipeline = create_pipeline(&self.device, layouts, self.config.format, slot);
                match pollster::block_on(scope.pop()) {
                    None => ProgramState::Ready(pipeline),
                    Some(err) => ProgramState::LinkFailed(err.to_string()),
                }
            }
            ProgramState::Validated
            | ProgramState::Ready(_)
            | ProgramState::Failed(_)
            | ProgramState::LinkFailed(_) => {
                return Ok(false);
            }
        };
        slot.state = next;
        Ok(true)
    }

    fn status_of(&self, id: ProgramId) -> Result<ProgramStatus, GpuError> {
        let slot = self.programs.get(id).ok_or(GpuError::UnknownResource)?;
        Ok(match &slot.state {
            ProgramState::Ready(_) => ProgramStatus::Ready,
            ProgramState::Failed(messages) => ProgramStatus::Failed(messages.clone()),
            ProgramState::LinkFailed(log) => ProgramStatus::LinkFailed(log.clone()),
            _ => ProgramStatus::Pending,
        })
    }
}

impl GpuContext for WgpuContext {
    fn info(&self) -> &ContextInfo {
        &self.info
    }

    fn loss_signal(&self) -> &ContextLossSignal {
        &self.loss
    }

    fn canvas(&self) -> CanvasSize {
        let physical = self.window.inner_size();
        let scale_factor = self.window.scale_factor();
        let logical: winit::dpi::LogicalSize<f64> = physical.to_logical(scale_factor);
        CanvasSize {
            logical: Vec2::new(logical.width as f32, logical.height as f32),
            scale_factor: scale_factor as f32,
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        self.ensure_alive()?;
        if surface::apply_resize(&self.surface, &self.device, &mut self.config, width, height) {
            log::debug!("surface reconfigured to {width}x{height}");
        }
        Ok(())
    }

    fn create_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramId, GpuError> {
        self.ensure_alive()?;
        self.ensure_layouts(source.texture_count);
        Ok(self.programs.insert(ProgramSlot {
            label: source.label.to_string(),
            vertex: source.vertex.to_string(),
            fragment: source.fragment.to_string(),
            texture_count: source.texture_count,
            targets: source.targets.to_vec(),
            blend: source.blend,
            link_requested: false,
            state: ProgramState::Validating(ShaderStage::Vertex),
        }))
    }

    fn link_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        self.ensure_alive()?;
        let slot = self.programs.get_mut(program).ok_or(GpuError::UnknownResource)?;
        slot.link_requested = true;
        Ok(())
    }

    fn program_status(&mut self, program: ProgramId) -> Result<ProgramStatus, GpuError> {
        self.ensure_alive()?;
        if self.info.capabilities.parallel_compile {
            self.step_program(program)?;
        } else {
            while self.step_program(program)? {}
        }
        self.status_of(program)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        self.programs.remove(program);
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<TextureId, GpuError> {
        self.ensure_alive()?;
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if desc.render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texel_format(desc.format),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(self.textures.insert(TextureSlot {
            texture,
            view,
            width: desc.width.max(1),
            height: desc.height.max(1),
            format: desc.format,
        }))
    }

    fn write_texture(&mut self, texture: TextureId, data: &[u8]) -> Result<(), GpuError> {
        self.ensure_alive()?;
        let slot = self.textures.get(texture).ok_or(GpuError::UnknownResource)?;
        let bytes_per_row = slot.width * slot.format.bytes_per_texel();
        let expected = bytes_per_row as usize * slot.height as usize;
        if data.len() != expected {
            return Err(GpuError::Backend(format!(
                "texture upload of {} bytes, expected {expected}",
                data.len()
            )));
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &slot.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(slot.height),
            },
            wgpu::Extent3d {
                width: slot.width,
                height: slot.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.textures.remove(texture) {
            slot.texture.destroy();
        }
    }

    fn begin_frame(&mut self) -> Result<(), GpuError> {
        self.ensure_alive()?;
        // An unfinished frame from an aborted render is discarded.
        self.frame = None;

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err) => {
                return Err(
                    match surface::map_surface_error(&self.surface, &self.device, &self.config, err) {
                        SurfaceErrorAction::Reconfigured => {
                            GpuError::SurfaceUnavailable("surface reconfigured")
                        }
                        SurfaceErrorAction::SkipFrame => {
                            GpuError::SurfaceUnavailable("surface timeout")
                        }
                        SurfaceErrorAction::Lost => {
                            self.loss.mark_lost();
                            GpuError::ContextLost
                        }
                    },
                );
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("penumbra frame encoder"),
            });

        self.frame = Some(WgpuFrame {
            surface_texture,
            view,
            encoder,
        });
        Ok(())
    }

    fn submit_pass(&mut self, pass: PassRequest<'_>) -> Result<(), GpuError> {
        self.ensure_alive()?;

        let Self {
            device,
            queue,
            config,
            sampler,
            programs,
            textures,
            layouts,
            streams,
            frame,
            ..
        } = self;
        let frame = frame.as_mut().ok_or(GpuError::NoFrame)?;

        let texture_count = pass.textures.len() as u32;
        let layouts = layouts.get(&texture_count).ok_or(GpuError::UnknownResource)?;

        let pipelines = pass
            .draws
            .iter()
            .map(|draw| match programs.get(draw.program).map(|slot| &slot.state) {
                Some(ProgramState::Ready(pipeline)) => Ok(pipeline),
                Some(_) => Err(GpuError::ProgramNotReady),
                None => Err(GpuError::UnknownResource),
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Tile blocks are packed at the dynamic offset alignment.
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment).max(16);
        let block_size = pass
            .draws
            .iter()
            .map(|d| (d.block.len() * size_of::<[f32; 4]>()) as u64)
            .max()
            .unwrap_or(0)
            .max(16);
        let stride = block_size.next_multiple_of(alignment);
        let mut packed = vec![0u8; (stride * pass.draws.len().max(1) as u64) as usize];
        for (i, draw) in pass.draws.iter().enumerate() {
            let src: &[u8] = bytemuck::cast_slice(&draw.block);
            let start = i * stride as usize;
            packed[start..start + src.len()].copy_from_slice(src);
        }

        let buffers = streams
            .entry(pass.label.to_string())
            .or_insert_with(|| PassBuffers::new(device, pass.label));
        buffers.reserve(device, pass.label, packed.len() as u64);
        queue.write_buffer(&buffers.globals, 0, bytemuck::bytes_of(&pass.globals));
        queue.write_buffer(&buffers.blocks, 0, &packed);

        let mut globals_entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffers.globals.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ];
        for (i, id) in pass.textures.iter().enumerate() {
            let slot = textures.get(*id).ok_or(GpuError::UnknownResource)?;
            globals_entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(&slot.view),
            });
        }
        let globals_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("penumbra globals bind group"),
            layout: &layouts.globals,
            entries: &globals_entries,
        });
        let blocks_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("penumbra tile block bind group"),
            layout: &layouts.blocks,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffers.blocks,
                    offset: 0,
                    size: NonZeroU64::new(block_size),
                }),
            }],
        });

        let (views, target_size) = match pass.target {
            PassTarget::Surface => (vec![&frame.view], (config.width, config.height)),
            PassTarget::Textures(ids) => {
                let slots = ids
                    .iter()
                    .map(|id| textures.get(*id).ok_or(GpuError::UnknownResource))
                    .collect::<Result<Vec<_>, _>>()?;
                let size = slots.first().map_or((1, 1), |s| (s.width, s.height));
                (slots.into_iter().map(|s| &s.view).collect(), size)
            }
        };

        let clear = wgpu::Color {
            r: pass.clear.r as f64,
            g: pass.clear.g as f64,
            b: pass.clear.b as f64,
            a: pass.clear.a as f64,
        };
        let attachments: Vec<_> = views
            .into_iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.label),
            color_attachments: &attachments,
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        rpass.set_bind_group(0, &globals_group, &[]);

        for (i, (draw, pipeline)) in pass.draws.iter().zip(pipelines).enumerate() {
            let Some((x, y, w, h)) = clamp_scissor(draw.scissor, target_size) else {
                continue;
            };
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(1, &blocks_group, &[(i as u64 * stride) as u32]);
            rpass.set_scissor_rect(x, y, w, h);
            rpass.draw(0..3, 0..1);
        }

        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        self.ensure_alive()?;
        let frame = self.frame.take().ok_or(GpuError::NoFrame)?;
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        self.window.pre_present_notify();
        drop(frame.view);
        frame.surface_texture.present();
        Ok(())
    }
}

impl PassBuffers {
    fn new(device: &wgpu::Device, label: &str) -> Self {
        let globals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("penumbra {label} globals ubo")),
            size: size_of::<GlobalUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            globals,
            blocks: create_block_buffer(device, label, 4096),
            blocks_capacity: 4096,
        }
    }

    fn reserve(&mut self, device: &wgpu::Device, label: &str, size: u64) {
        if size <= self.blocks_capacity {
            return;
        }
        let capacity = size.next_power_of_two();
        self.blocks = create_block_buffer(device, label, capacity);
        self.blocks_capacity = capacity;
    }
}

fn create_block_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("penumbra {label} tile blocks")),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn probe_adapter(adapter: &wgpu::Adapter, device: &wgpu::Device) -> ContextInfo {
    let adapter_info = adapter.get_info();
    let float_features = adapter.get_texture_format_features(wgpu::TextureFormat::R16Float);

    let feature_level = if adapter.get_downlevel_capabilities().is_webgpu_compliant() {
        FeatureLevel::Extended
    } else {
        FeatureLevel::Baseline
    };
    let capabilities = Capabilities {
        feature_level,
        float_textures: float_features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
        float_linear_filtering: float_features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE),
        parallel_compile: adapter_info.backend != wgpu::Backend::Gl,
    }
    .restricted(false, false);

    ContextInfo {
        capabilities,
        hardware: HardwareInfo {
            adapter: adapter_info.name,
            vendor: format!("{:#06x}", adapter_info.vendor),
            backend: format!("{:?}", adapter_info.backend),
        },
        max_texture_dimension: device.limits().max_texture_dimension_2d,
    }
}

fn texel_format(format: TexelFormat) -> wgpu::TextureFormat {
    match format {
        TexelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TexelFormat::R16Float => wgpu::TextureFormat::R16Float,
    }
}

fn create_layouts(device: &wgpu::Device, texture_count: u32, filterable: bool) -> PassLayouts {
    let mut entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(size_of::<GlobalUniforms>() as u64),
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(if filterable {
                wgpu::SamplerBindingType::Filtering
            } else {
                wgpu::SamplerBindingType::NonFiltering
            }),
            count: None,
        },
    ];
    for i in 0..texture_count {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2 + i,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }

    let globals = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("penumbra globals bgl"),
        entries: &entries,
    });
    let blocks = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("penumbra tile block bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: None,
            },
            count: None,
        }],
    });
    let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("penumbra pipeline layout"),
        bind_group_layouts: &[&globals, &blocks],
        immediate_size: 0,
    });

    PassLayouts {
        globals,
        blocks,
        pipeline,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    surface_format: wgpu::TextureFormat,
    slot: &ProgramSlot,
) -> wgpu::RenderPipeline {
    let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{} vertex", slot.label)),
        source: wgpu::ShaderSource::Wgsl(slot.vertex.as_str().into()),
    });
    let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{} fragment", slot.label)),
        source: wgpu::ShaderSource::Wgsl(slot.fragment.as_str().into()),
    });

    let blend = match slot.blend {
        BlendMode::Replace => None,
        BlendMode::Additive => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        }),
    };
    let targets: Vec<_> = slot
        .targets
        .iter()
        .map(|target| {
            Some(wgpu::ColorTargetState {
                format: match target {
                    ColorTarget::Surface => surface_format,
                    ColorTarget::Texture(format) => texel_format(*format),
                },
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&slot.label),
        layout: Some(&layouts.pipeline),
        vertex: wgpu::VertexState {
            module: &vertex,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &targets,
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

/// Parses and validates WGSL, reporting 1-based line numbers.
fn validate_wgsl(stage: ShaderStage, source: &str) -> Result<(), Vec<CompileMessage>> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| {
        vec![CompileMessage {
            stage,
            line: err.location(source).map(|loc| loc.line_number),
            message: err.message().to_string(),
        }]
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| {
        vec![CompileMessage {
            stage,
            line: err.location(source).map(|loc| loc.line_number),
            message: err.as_inner().to_string(),
        }]
    })?;

    Ok(())
}

fn clamp_scissor(rect: super::PixelRect, (width, height): (u32, u32)) -> Option<(u32, u32, u32, u32)> {
    let x = rect.x.min(width);
    let y = rect.y.min(height);
    let w = rect.width.min(width - x);
    let h = rect.height.min(height - y);
    (w > 0 && h > 0).then_some((x, y, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::PixelRect;

    #[test]
    fn scissor_is_clamped_to_target() {
        assert_eq!(clamp_scissor(PixelRect::new(90, 0, 20, 10), (100, 100)), Some((90, 0, 10, 10)));
        assert_eq!(clamp_scissor(PixelRect::new(100, 0, 20, 10), (100, 100)), None);
    }

    #[test]
    fn invalid_wgsl_reports_line() {
        let src = "fn main() {\n    let x = ;\n}\n";
        let messages = validate_wgsl(ShaderStage::Fragment, src).unwrap_err();
        assert_eq!(messages[0].line, Some(2));
    }

    #[test]
    fn validation_errors_are_caught() {
        let src = "fn f() -> f32 {\n    return undefined_thing;\n}\n";
        assert!(validate_wgsl(ShaderStage::Vertex, src).is_err());
    }
}
