use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::coords::Vec2;
use crate::device::{GpuContext, GpuError};
use crate::drawable::{DescriptorSet, Drawable, DrawableDescriptor};

use super::{CompileError, Insights, Pipeline, RenderError, RuntimeOverrides, StartupSettings};

/// Creates GPU contexts, once at startup and again after every loss.
pub trait ContextFactory {
    fn create_context(&mut self) -> anyhow::Result<Box<dyn GpuContext>>;
}

impl<F> ContextFactory for F
where
    F: FnMut() -> anyhow::Result<Box<dyn GpuContext>>,
{
    fn create_context(&mut self) -> anyhow::Result<Box<dyn GpuContext>> {
        self()
    }
}

type BuildFuture = Pin<Box<dyn Future<Output = Result<Pipeline, CompileError>>>>;

enum RendererState {
    Ready(Pipeline),
    Lost,
    Rebuilding(BuildFuture),
    Destroyed,
}

impl RendererState {
    fn name(&self) -> &'static str {
        match self {
            RendererState::Ready(_) => "ready",
            RendererState::Lost => "lost",
            RendererState::Rebuilding(_) => "rebuilding",
            RendererState::Destroyed => "destroyed",
        }
    }
}

/// Compiles a renderer for `descriptors` on a context from `factory`.
///
/// Descriptor, substitution and shader errors are returned here; nothing is
/// retried.
pub async fn compile(
    mut factory: impl ContextFactory + 'static,
    descriptors: impl IntoIterator<Item = DrawableDescriptor>,
    startup: StartupSettings,
) -> Result<Renderer, RenderError> {
    let descriptors = Arc::new(DescriptorSet::new(descriptors)?);
    let ctx = factory
        .create_context()
        .map_err(|e| GpuError::Backend(format!("{e:#}")))?;
    let pipeline = Pipeline::build(ctx, descriptors.clone(), startup.clone()).await?;

    Ok(Renderer {
        factory: Box::new(factory),
        descriptors,
        startup,
        state: RendererState::Ready(pipeline),
        overrides: RuntimeOverrides::default(),
        view_area: None,
        restores: 0,
    })
}

/// Renderer that survives context loss.
///
/// Loss is detected at the top of [`Renderer::render`] or from any failing
/// operation. The renderer then rebuilds itself on a fresh context over the
/// following frames and replays the runtime settings and view area. Until it
/// is ready again every call is a no-op.
pub struct Renderer {
    factory: Box<dyn ContextFactory>,
    descriptors: Arc<DescriptorSet>,
    startup: StartupSettings,
    state: RendererState,
    overrides: RuntimeOverrides,
    view_area: Option<(Vec2, Vec2)>,
    restores: usize,
}

impl Renderer {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, RendererState::Ready(_))
    }

    /// How many times the renderer has been rebuilt after a context loss.
    #[inline]
    pub fn restore_count(&self) -> usize {
        self.restores
    }

    fn pipeline(&self) -> Option<&Pipeline> {
        match &self.state {
            RendererState::Ready(p) => Some(p),
            _ => None,
        }
    }

    pub fn set_view_area(&mut self, top_left: Vec2, size: Vec2) {
        self.view_area = Some((top_left, size));
        if let RendererState::Ready(p) = &mut self.state {
            p.set_view_area(top_left, size);
        }
    }

    /// Merges `overrides` into the retained settings and applies them.
    pub fn set_runtime_settings(&mut self, overrides: RuntimeOverrides) {
        let result = match &mut self.state {
            RendererState::Ready(p) => p.set_runtime_settings(&overrides),
            _ => Ok(()),
        };
        self.overrides.merge(&overrides);
        if let Err(err) = result {
            self.handle_error(err);
        }
    }

    /// Queues `drawable` for the next [`Renderer::render`]. Dropped while the
    /// renderer is not ready.
    pub fn add_drawable(&mut self, drawable: impl Drawable + 'static) -> Result<(), RenderError> {
        self.add_boxed(Box::new(drawable))
    }

    pub fn add_boxed(&mut self, drawable: Box<dyn Drawable>) -> Result<(), RenderError> {
        let RendererState::Ready(p) = &mut self.state else {
            return Ok(());
        };
        match p.add_drawable(drawable) {
            Err(err) if err.is_context_lost() => {
                self.mark_lost();
                Ok(())
            }
            other => other,
        }
    }

    /// Draws the queued drawables, or advances recovery while the context is lost.
    pub fn render(&mut self) -> Result<(), RenderError> {
        match &mut self.state {
            RendererState::Ready(p) => {
                if p.is_lost() {
                    self.mark_lost();
                    return Ok(());
                }
                match p.render() {
                    Err(err) if err.is_context_lost() => {
                        self.mark_lost();
                        Ok(())
                    }
                    other => other,
                }
            }
            RendererState::Lost => {
                self.start_rebuild();
                self.poll_rebuild()
            }
            RendererState::Rebuilding(_) => self.poll_rebuild(),
            RendererState::Destroyed => Ok(()),
        }
    }

    fn handle_error(&mut self, err: RenderError) {
        if err.is_context_lost() {
            self.mark_lost();
        } else {
            log::warn!("{err}");
        }
    }

    fn mark_lost(&mut self) {
        if let RendererState::Ready(mut p) = std::mem::replace(&mut self.state, RendererState::Lost) {
            log::warn!("GPU context lost, rebuilding renderer");
            p.destroy();
        }
    }

    fn start_rebuild(&mut self) {
        let ctx = match self.factory.create_context() {
            Ok(ctx) => ctx,
            Err(err) => {
                log::warn!("could not create a GPU context, retrying next frame: {err:#}");
                return;
            }
        };
        let build = Pipeline::build(ctx, self.descriptors.clone(), self.startup.clone());
        self.state = RendererState::Rebuilding(Box::pin(build));
    }

    /// Polls the build once; the host loop calls again next frame.
    fn poll_rebuild(&mut self) -> Result<(), RenderError> {
        let RendererState::Rebuilding(build) = &mut self.state else {
            return Ok(());
        };
        let mut cx = Context::from_waker(Waker::noop());
        match build.as_mut().poll(&mut cx) {
            Poll::Pending => Ok(()),
            Poll::Ready(Ok(mut pipeline)) => {
                if let Some((top_left, size)) = self.view_area {
                    pipeline.set_view_area(top_left, size);
                }
                let replayed = pipeline.set_runtime_settings(&self.overrides);
                self.state = RendererState::Ready(pipeline);
                self.restores += 1;
                log::info!("renderer restored after context loss");
                if let Err(err) = replayed {
                    self.handle_error(err);
                }
                Ok(())
            }
            Poll::Ready(Err(err)) => {
                self.state = RendererState::Lost;
                let err = RenderError::from(err);
                if err.is_context_lost() {
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Logical canvas size; zero while not ready.
    pub fn canvas_size(&self) -> Vec2 {
        self.pipeline().map_or(Vec2::zero(), Pipeline::canvas_size)
    }

    pub fn view_area_size(&self) -> Vec2 {
        self.pipeline().map_or(Vec2::zero(), Pipeline::view_area_size)
    }

    pub fn insights(&self) -> Option<&Insights> {
        self.pipeline().map(Pipeline::insights)
    }

    pub fn display_to_world(&self, p: Vec2) -> Vec2 {
        self.pipeline().map_or(Vec2::zero(), |pipeline| pipeline.display_to_world(p))
    }

    pub fn world_to_display(&self, p: Vec2) -> Vec2 {
        self.pipeline().map_or(Vec2::zero(), |pipeline| pipeline.world_to_display(p))
    }

    /// Flags the current context as lost, as the platform would.
    pub fn simulate_context_loss(&self) {
        if let Some(p) = self.pipeline() {
            p.context().simulate_loss();
        }
    }

    /// Releases every GPU resource. Later calls are no-ops.
    pub fn destroy(&mut self) {
        let previous = std::mem::replace(&mut self.state, RendererState::Destroyed);
        log::debug!("destroying renderer ({})", previous.name());
        if let RendererState::Ready(mut p) = previous {
            p.destroy();
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if !matches!(self.state, RendererState::Destroyed) {
            self.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::device::mock::{MockConfig, MockContext, MockJournal};
    use crate::drawable::test_support::{Dot, Glow, dot_descriptor, glow_descriptor};

    /// Contexts from this factory share `journal`; the first one uses `first`.
    fn factory(
        journal: Rc<RefCell<MockJournal>>,
        first: MockConfig,
    ) -> impl FnMut() -> anyhow::Result<Box<dyn GpuContext>> {
        let mut created = 0;
        move || {
            let config = if created == 0 { first.clone() } else { MockConfig::default() };
            created += 1;
            Ok(Box::new(MockContext::new(config, journal.clone())) as Box<dyn GpuContext>)
        }
    }

    fn renderer(first: MockConfig) -> (Renderer, Rc<RefCell<MockJournal>>) {
        let journal = MockJournal::shared();
        let renderer = pollster::block_on(compile(
            factory(journal.clone(), first),
            [dot_descriptor(&[0, 2]), glow_descriptor(&[0, 1])],
            StartupSettings::default(),
        ))
        .expect("renderer compiles");
        (renderer, journal)
    }

    fn overflowed(renderer: &Renderer) -> Option<f64> {
        renderer
            .insights()?
            .number(&["render pass", "distance", "overflowed drawables"])
    }

    #[test]
    fn uniform_blocks_are_padded_and_overflow_is_reported() {
        let (mut renderer, journal) = renderer(MockConfig::default());

        renderer.add_drawable(Dot::new(400.0, 300.0, 10.0)).unwrap();
        renderer.render().unwrap();
        {
            let j = journal.borrow();
            let pass = j.passes_labelled("distance").last().unwrap();
            // Tiles near the dot bind the capacity-2 variant: 2 slots per column, 2 columns.
            assert!(pass.draws.iter().any(|d| d.block.len() == 4));
            assert!(pass.draws.iter().all(|d| d.block.len() == 4 || d.block.len() == 1));
        }
        assert_eq!(overflowed(&renderer), Some(0.0));

        for _ in 0..3 {
            renderer.add_drawable(Dot::new(400.0, 300.0, 10.0)).unwrap();
        }
        renderer.render().unwrap();
        assert!(overflowed(&renderer).unwrap() > 0.0);
        let j = journal.borrow();
        let pass = j.passes_labelled("distance").last().unwrap();
        assert!(pass.draws.iter().all(|d| d.block.len() <= 4));
    }

    #[test]
    fn context_loss_rebuilds_and_replays_view_area() {
        let (mut renderer, journal) = renderer(MockConfig {
            lose_at_pass: Some(0),
            ..MockConfig::default()
        });
        assert!(renderer.is_ready());
        renderer.set_view_area(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0));
        renderer.set_runtime_settings(RuntimeOverrides {
            lights_tile_multiplier: Some(2),
            ..RuntimeOverrides::default()
        });

        renderer.add_drawable(Dot::new(50.0, 25.0, 5.0)).unwrap();
        renderer.render().unwrap();
        assert!(!renderer.is_ready());
        assert_eq!(renderer.canvas_size(), Vec2::zero());
        assert!(renderer.insights().is_none());
        // Drawables handed over while lost are dropped.
        renderer.add_drawable(Glow::new(0.0, 0.0, 1.0)).unwrap();

        let mut ticks = 0;
        while !renderer.is_ready() {
            renderer.render().unwrap();
            ticks += 1;
            assert!(ticks < 10, "renderer never recovered");
        }
        assert_eq!(journal.borrow().contexts_created, 2);
        assert_eq!(renderer.restore_count(), 1);
        assert_eq!(renderer.view_area_size(), Vec2::new(100.0, 50.0));

        renderer.add_drawable(Glow::new(50.0, 25.0, 1.0)).unwrap();
        renderer.render().unwrap();
        let j = journal.borrow();
        let distance = j.passes_labelled("distance").last().unwrap();
        assert_eq!(distance.globals.square_to_aspect, [1.0, 0.5]);
        let lights = j.passes_labelled("lights").last().unwrap();
        assert_eq!(lights.draws.len(), 4);
    }

    #[test]
    fn view_area_set_during_recovery_is_used_after_restore() {
        let (mut renderer, journal) = renderer(MockConfig {
            lose_at_pass: Some(0),
            ..MockConfig::default()
        });
        renderer.render().unwrap();
        assert!(!renderer.is_ready());

        // Lost: stored for the rebuild.
        renderer.set_view_area(Vec2::new(0.0, 100.0), Vec2::new(300.0, 100.0));
        renderer.render().unwrap();
        assert!(!renderer.is_ready(), "programs are still pending");

        // Rebuilding: the later area wins.
        renderer.set_view_area(Vec2::new(-100.0, 400.0), Vec2::new(200.0, 400.0));
        let mut ticks = 0;
        while !renderer.is_ready() {
            renderer.render().unwrap();
            ticks += 1;
            assert!(ticks < 10, "renderer never recovered");
        }
        assert_eq!(renderer.view_area_size(), Vec2::new(200.0, 400.0));

        let before = journal.borrow().passes_labelled("distance").count();
        renderer.add_drawable(Dot::new(0.0, 200.0, 5.0)).unwrap();
        renderer.render().unwrap();
        let j = journal.borrow();
        assert_eq!(j.passes_labelled("distance").count(), before + 1);
        let distance = j.passes_labelled("distance").last().unwrap();
        assert_eq!(distance.globals.square_to_aspect, [0.5, 1.0]);
        assert_eq!(distance.globals.world_length_to_ndc, 2.0 / 400.0);
    }

    #[test]
    fn loss_signal_is_checked_before_rendering() {
        let (mut renderer, journal) = renderer(MockConfig::default());
        renderer.simulate_context_loss();
        renderer.render().unwrap();
        assert!(!renderer.is_ready());
        assert!(journal.borrow().passes.is_empty());
        assert_eq!(renderer.display_to_world(Vec2::new(1.0, 1.0)), Vec2::zero());
    }

    #[test]
    fn factory_failure_is_retried() {
        let journal = MockJournal::shared();
        let mut attempts = 0;
        let shared = journal.clone();
        let flaky = move || -> anyhow::Result<Box<dyn GpuContext>> {
            attempts += 1;
            if attempts == 2 {
                anyhow::bail!("adapter unavailable");
            }
            Ok(Box::new(MockContext::new(MockConfig::default(), shared.clone())))
        };
        let mut renderer = pollster::block_on(compile(
            flaky,
            [dot_descriptor(&[0, 1])],
            StartupSettings::default(),
        ))
        .unwrap();

        renderer.simulate_context_loss();
        renderer.render().unwrap();
        renderer.render().unwrap();
        assert_eq!(journal.borrow().contexts_created, 1);

        for _ in 0..5 {
            renderer.render().unwrap();
        }
        assert!(renderer.is_ready());
        assert_eq!(journal.borrow().contexts_created, 2);
    }

    #[test]
    fn invalid_descriptors_fail_compile() {
        let journal = MockJournal::shared();
        let result = pollster::block_on(compile(
            factory(journal.clone(), MockConfig::default()),
            [dot_descriptor(&[0, 1]), dot_descriptor(&[0, 2])],
            StartupSettings::default(),
        ));
        assert!(matches!(result, Err(RenderError::Config(_))));
        assert_eq!(journal.borrow().contexts_created, 0);
    }

    #[test]
    fn destroy_is_idempotent_and_runs_on_drop() {
        let (mut renderer, journal) = renderer(MockConfig::default());
        renderer.destroy();
        let after_destroy = journal.borrow().programs_destroyed;
        assert_eq!(after_destroy, journal.borrow().programs.len());
        renderer.destroy();
        renderer.render().unwrap();
        drop(renderer);
        assert_eq!(journal.borrow().programs_destroyed, after_destroy);
    }
}
