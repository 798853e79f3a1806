//! Recording [`GpuContext`] for tests.
//!
//! Nothing is rendered; every call is validated against the same rules the wgpu
//! backend enforces and recorded into a [`MockJournal`] shared with the test.

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::SlotMap;

use crate::coords::Vec2;

use super::{
    CanvasSize, Capabilities, CompileMessage, ContextInfo, ContextLossSignal, FeatureLevel,
    GlobalUniforms, GpuContext, GpuError, HardwareInfo, PassRequest, PassTarget, ProgramId,
    ProgramSource, ProgramStatus, ShaderStage, TexelFormat, TextureDesc, TextureId, TileDraw,
};

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub capabilities: Capabilities,
    /// Status polls a linked program stays pending when compilation is parallel.
    pub compile_polls: u32,
    /// Programs whose fragment contains this marker fail to compile.
    pub fail_marker: Option<String>,
    /// Linked programs whose fragment contains this marker fail to build a pipeline.
    pub link_fail_marker: Option<String>,
    /// The context is lost while submitting this pass (0-based, counted per context).
    pub lose_at_pass: Option<usize>,
    pub max_texture_dimension: u32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            capabilities: Capabilities {
                feature_level: FeatureLevel::Extended,
                float_textures: true,
                float_linear_filtering: true,
                parallel_compile: true,
            },
            compile_polls: 1,
            fail_marker: None,
            link_fail_marker: None,
            lose_at_pass: None,
            max_texture_dimension: 8192,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedTarget {
    Textures(Vec<TextureId>),
    Surface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    pub label: String,
    pub target: RecordedTarget,
    pub globals: GlobalUniforms,
    pub textures: Vec<TextureId>,
    pub draws: Vec<TileDraw>,
}

#[derive(Debug, Clone)]
pub struct RecordedProgram {
    pub label: String,
    pub fragment: String,
}

/// State shared between a test and every mock context it creates.
#[derive(Debug)]
pub struct MockJournal {
    /// Canvas reported by contexts; tests may change it between frames.
    pub canvas: CanvasSize,
    pub contexts_created: usize,
    pub loss_signals: Vec<ContextLossSignal>,
    pub programs: Vec<RecordedProgram>,
    pub programs_destroyed: usize,
    pub textures_created: Vec<(String, u32, u32, TexelFormat)>,
    pub textures_destroyed: usize,
    pub texture_writes: Vec<(TextureId, usize)>,
    pub surface_sizes: Vec<(u32, u32)>,
    pub passes: Vec<RecordedPass>,
    pub frames_ended: usize,
}

impl Default for MockJournal {
    fn default() -> Self {
        Self {
            canvas: CanvasSize {
                logical: Vec2::new(800.0, 600.0),
                scale_factor: 1.0,
            },
            contexts_created: 0,
            loss_signals: Vec::new(),
            programs: Vec::new(),
            programs_destroyed: 0,
            textures_created: Vec::new(),
            textures_destroyed: 0,
            texture_writes: Vec::new(),
            surface_sizes: Vec::new(),
            passes: Vec::new(),
            frames_ended: 0,
        }
    }
}

impl MockJournal {
    pub fn shared() -> Rc<RefCell<MockJournal>> {
        Rc::new(RefCell::new(MockJournal::default()))
    }

    pub fn passes_labelled(&self, label: &str) -> impl Iterator<Item = &RecordedPass> + '_ {
        let label = label.to_string();
        self.passes.iter().filter(move |p| p.label == label)
    }
}

struct MockProgram {
    fragment: String,
    texture_count: u32,
    linked: bool,
    polls_remaining: u32,
}

struct MockTexture {
    width: u32,
    height: u32,
    format: TexelFormat,
}

pub struct MockContext {
    config: MockConfig,
    info: ContextInfo,
    loss: ContextLossSignal,
    journal: Rc<RefCell<MockJournal>>,
    programs: SlotMap<ProgramId, MockProgram>,
    textures: SlotMap<TextureId, MockTexture>,
    in_frame: bool,
    passes_submitted: usize,
}

impl MockContext {
    pub fn new(config: MockConfig, journal: Rc<RefCell<MockJournal>>) -> Self {
        let loss = ContextLossSignal::new();
        {
            let mut j = journal.borrow_mut();
            j.contexts_created += 1;
            j.loss_signals.push(loss.clone());
        }
        Self {
            info: ContextInfo {
                capabilities: config.capabilities,
                hardware: HardwareInfo {
                    adapter: "mock adapter".into(),
                    vendor: "0x0000".into(),
                    backend: "Mock".into(),
                },
                max_texture_dimension: config.max_texture_dimension,
            },
            config,
            loss,
            journal,
            programs: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            in_frame: false,
            passes_submitted: 0,
        }
    }

    fn ensure_alive(&self) -> Result<(), GpuError> {
        if self.loss.is_lost() {
            Err(GpuError::ContextLost)
        } else {
            Ok(())
        }
    }
}

impl GpuContext for MockContext {
    fn info(&self) -> &ContextInfo {
        &self.info
    }

    fn loss_signal(&self) -> &ContextLossSignal {
        &self.loss
    }

    fn canvas(&self) -> CanvasSize {
        self.journal.borrow().canvas
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        self.ensure_alive()?;
        self.journal.borrow_mut().surface_sizes.push((width, height));
        Ok(())
    }

    fn create_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramId, GpuError> {
        self.ensure_alive()?;
        self.journal.borrow_mut().programs.push(RecordedProgram {
            label: source.label.to_string(),
            fragment: source.fragment.to_string(),
        });
        Ok(self.programs.insert(MockProgram {
            fragment: source.fragment.to_string(),
            texture_count: source.texture_count,
            linked: false,
            polls_remaining: self.config.compile_polls,
        }))
    }

    fn link_program(&mut self, program: ProgramId) -> Result<(), GpuError> {
        self.ensure_alive()?;
        let p = self.programs.get_mut(program).ok_or(GpuError::UnknownResource)?;
        p.linked = true;
        Ok(())
    }

    fn program_status(&mut self, program: ProgramId) -> Result<ProgramStatus, GpuError> {
        self.ensure_alive()?;
        let parallel = self.info.capabilities.parallel_compile;
        let p = self.programs.get_mut(program).ok_or(GpuError::UnknownResource)?;

        if let Some(marker) = &self.config.fail_marker {
            if let Some(index) = p.fragment.lines().position(|l| l.contains(marker.as_str())) {
                return Ok(ProgramStatus::Failed(vec![CompileMessage {
                    stage: ShaderStage::Fragment,
                    line: Some(index as u32 + 1),
                    message: format!("unexpected `{marker}`"),
                }]));
            }
        }
        if !p.linked {
            return Ok(ProgramStatus::Pending);
        }
        if let Some(marker) = &self.config.link_fail_marker {
            if p.fragment.contains(marker.as_str()) {
                return Ok(ProgramStatus::LinkFailed(format!("pipeline rejected: `{marker}`")));
            }
        }
        if parallel && p.polls_remaining > 0 {
            p.polls_remaining -= 1;
            return Ok(ProgramStatus::Pending);
        }
        Ok(ProgramStatus::Ready)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if self.programs.remove(program).is_some() {
            self.journal.borrow_mut().programs_destroyed += 1;
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<TextureId, GpuError> {
        self.ensure_alive()?;
        self.journal.borrow_mut().textures_created.push((
            desc.label.to_string(),
            desc.width,
            desc.height,
            desc.format,
        ));
        Ok(self.textures.insert(MockTexture {
            width: desc.width.max(1),
            height: desc.height.max(1),
            format: desc.format,
        }))
    }

    fn write_texture(&mut self, texture: TextureId, data: &[u8]) -> Result<(), GpuError> {
        self.ensure_alive()?;
        let t = self.textures.get(texture).ok_or(GpuError::UnknownResource)?;
        let expected = (t.width * t.height * t.format.bytes_per_texel()) as usize;
        if data.len() != expected {
            return Err(GpuError::Backend(format!(
                "texture upload of {} bytes, expected {expected}",
                data.len()
            )));
        }
        self.journal.borrow_mut().texture_writes.push((texture, data.len()));
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(texture).is_some() {
            self.journal.borrow_mut().textures_destroyed += 1;
        }
    }

    fn begin_frame(&mut self) -> Result<(), GpuError> {
        self.ensure_alive()?;
        self.in_frame = true;
        Ok(())
    }

    fn submit_pass(&mut self, pass: PassRequest<'_>) -> Result<(), GpuError> {
        self.ensure_alive()?;
        if !self.in_frame {
            return Err(GpuError::NoFrame);
        }
        if self.config.lose_at_pass == Some(self.passes_submitted) {
            self.loss.mark_lost();
            return Err(GpuError::ContextLost);
        }
        self.passes_submitted += 1;

        for draw in &pass.draws {
            let p = self.programs.get(draw.program).ok_or(GpuError::UnknownResource)?;
            if !p.linked {
                return Err(GpuError::ProgramNotReady);
            }
            if p.texture_count as usize != pass.textures.len() {
                return Err(GpuError::Backend(format!(
                    "program expects {} textures, pass binds {}",
                    p.texture_count,
                    pass.textures.len()
                )));
            }
        }
        for id in pass.textures {
            self.textures.get(*id).ok_or(GpuError::UnknownResource)?;
        }

        self.journal.borrow_mut().passes.push(RecordedPass {
            label: pass.label.to_string(),
            target: match pass.target {
                PassTarget::Surface => RecordedTarget::Surface,
                PassTarget::Textures(ids) => RecordedTarget::Textures(ids.to_vec()),
            },
            globals: pass.globals,
            textures: pass.textures.to_vec(),
            draws: pass.draws,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        self.ensure_alive()?;
        if !std::mem::take(&mut self.in_frame) {
            return Err(GpuError::NoFrame);
        }
        self.journal.borrow_mut().frames_ended += 1;
        Ok(())
    }
}
