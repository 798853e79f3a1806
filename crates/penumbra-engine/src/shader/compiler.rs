use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::device::{
    BlendMode, ColorTarget, CompileMessage, GpuContext, ProgramId, ProgramSource, ProgramStatus,
    ShaderStage,
};
use crate::renderer::{CompileError, Diagnostic};

use super::{Substitutions, substitute};

/// A program before placeholder substitution.
#[derive(Debug, Clone)]
pub struct ProgramTemplate {
    pub label: String,
    pub vertex: &'static str,
    pub fragment: &'static str,
    pub texture_count: u32,
    pub targets: Vec<ColorTarget>,
    pub blend: BlendMode,
}

/// Ticket for a submitted program, redeemed from the [`CompiledBatch`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PendingProgram(usize);

struct PendingEntry {
    label: String,
    vertex: String,
    fragment: String,
    program: ProgramId,
}

/// Collects programs and compiles them as one batch.
///
/// Backends that compile in parallel are polled without blocking; the flush
/// future yields back to the executor between polling passes so a host loop
/// stays responsive while a large variant set builds.
#[derive(Default)]
pub struct ParallelCompiler {
    pending: Vec<PendingEntry>,
}

impl ParallelCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitutes `template` and starts compiling it.
    pub fn submit(
        &mut self,
        ctx: &mut dyn GpuContext,
        template: &ProgramTemplate,
        substitutions: &Substitutions,
    ) -> Result<PendingProgram, CompileError> {
        let vertex = substitute(template.vertex, substitutions)?;
        let fragment = substitute(template.fragment, substitutions)?;

        let program = ctx.create_program(&ProgramSource {
            label: &template.label,
            vertex: &vertex,
            fragment: &fragment,
            texture_count: template.texture_count,
            targets: &template.targets,
            blend: template.blend,
        })?;

        self.pending.push(PendingEntry {
            label: template.label.clone(),
            vertex,
            fragment,
            program,
        });
        Ok(PendingProgram(self.pending.len() - 1))
    }

    /// Destroys every submitted program without waiting for it.
    pub fn abandon(&mut self, ctx: &mut dyn GpuContext) {
        for entry in self.pending.drain(..) {
            ctx.destroy_program(entry.program);
        }
    }

    /// Links every submitted program and waits until all of them are usable.
    ///
    /// On the first failure every program of the batch is destroyed.
    pub async fn flush(&mut self, ctx: &mut dyn GpuContext) -> Result<CompiledBatch, CompileError> {
        let entries = std::mem::take(&mut self.pending);
        let started = Instant::now();
        log::debug!("compiling {} programs", entries.len());

        let result = poll_batch(ctx, &entries).await;
        if let Err(err) = result {
            for entry in &entries {
                ctx.destroy_program(entry.program);
            }
            return Err(err);
        }

        let elapsed = started.elapsed();
        log::info!(
            "compiled {} programs in {:.1} ms",
            entries.len(),
            elapsed.as_secs_f64() * 1000.0
        );
        Ok(CompiledBatch {
            programs: entries.into_iter().map(|e| Some(e.program)).collect(),
            elapsed,
        })
    }
}

async fn poll_batch(ctx: &mut dyn GpuContext, entries: &[PendingEntry]) -> Result<(), CompileError> {
    for entry in entries {
        ctx.link_program(entry.program)?;
    }

    let mut done = vec![false; entries.len()];
    let mut remaining = entries.len();
    while remaining > 0 {
        for (entry, done) in entries.iter().zip(done.iter_mut()) {
            if *done {
                continue;
            }
            match ctx.program_status(entry.program)? {
                ProgramStatus::Pending => {}
                ProgramStatus::Ready => {
                    *done = true;
                    remaining -= 1;
                }
                ProgramStatus::Failed(messages) => return Err(shader_error(entry, messages)),
                ProgramStatus::LinkFailed(message) => {
                    log::error!("program `{}` failed to link: {message}", entry.label);
                    return Err(CompileError::Link {
                        label: entry.label.clone(),
                        log: message,
                    });
                }
            }
        }
        if remaining > 0 {
            yield_now().await;
        }
    }
    Ok(())
}

fn shader_error(entry: &PendingEntry, messages: Vec<CompileMessage>) -> CompileError {
    let diagnostics: Vec<Diagnostic> = messages
        .into_iter()
        .map(|m| {
            let source = match m.stage {
                ShaderStage::Vertex => &entry.vertex,
                ShaderStage::Fragment => &entry.fragment,
            };
            let source_line = m
                .line
                .and_then(|line| source.lines().nth(line.saturating_sub(1) as usize))
                .map(|s| s.trim_end().to_string());
            Diagnostic {
                stage: m.stage,
                line: m.line,
                message: m.message,
                source_line,
            }
        })
        .collect();

    for d in &diagnostics {
        log::error!("program `{}`: {d}", entry.label);
    }
    CompileError::Shader {
        label: entry.label.clone(),
        diagnostics,
    }
}

/// Programs of a finished batch.
#[derive(Debug)]
pub struct CompiledBatch {
    programs: Vec<Option<ProgramId>>,
    elapsed: Duration,
}

impl CompiledBatch {
    /// Hands out the program for `pending`; each ticket redeems once.
    pub fn take(&mut self, pending: PendingProgram) -> Option<ProgramId> {
        self.programs.get_mut(pending.0)?.take()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Returns `Pending` once, waking itself, then completes.
fn yield_now() -> YieldNow {
    YieldNow(false)
}

struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
