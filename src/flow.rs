//! Host event loop and sketch lifecycle.
//!
//! A [`Sketch`] is the application: it loads its resources, starts once they
//! are all in, advances at a fixed pulse rate and records draws every frame.
//!
//! # Lifecycle
//!
//! 1. The window and [`Context`] are created.
//! 2. [`Sketch::on_load`] runs once. Asynchronous loads are handed to
//!    [`Loads`]; each keeps the start barrier closed until it resolves.
//! 3. Every frame the pending loads are polled. Once none are outstanding
//!    [`Sketch::on_start`] runs (in the same frame when nothing was enqueued).
//!    A barrier still closed after [`EngineConfig::load_timeout`] ends
//!    [`run`] with [`LoadError::Timeout`].
//! 4. After start, [`Sketch::on_pulse`] runs at [`Context::frame_rate`] Hz.
//!    A late pulse is run once, never in a burst of catch-up calls.
//! 5. Every frame the swapchain is cleared and [`Sketch::on_render`] records
//!    into the pass, then the frame is flushed and presented.

use std::{fmt::Debug, pin::Pin, sync::Arc, task::Poll};

use futures::{StreamExt, stream::FuturesUnordered};
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    context::{Context, EngineConfig},
    render::RenderError,
    resources::{LoadError, LoadTicket, PendingLoads},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Applies a finished load to the sketch.
pub type Apply<S> = Box<dyn FnOnce(&mut S, &mut Context) -> anyhow::Result<()>>;

type LoadFuture<S> = Pin<Box<dyn Future<Output = (LoadTicket, anyhow::Result<Apply<S>>)>>>;

/// The loads a sketch enqueued from [`Sketch::on_load`].
///
/// Futures are polled by the host loop once per frame on the loop's own
/// thread. When one resolves, its `apply` callback runs with the sketch and
/// the context and its ticket is settled. A future or callback that errors
/// settles its ticket as failed; the barrier still opens.
pub struct Loads<S> {
    pending: PendingLoads,
    running: FuturesUnordered<LoadFuture<S>>,
}

impl<S: 'static> Default for Loads<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Debug for Loads<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loads")
            .field("pending", &self.pending)
            .field("running", &self.running.len())
            .finish()
    }
}

impl<S: 'static> Loads<S> {
    pub fn new() -> Self {
        Self {
            pending: PendingLoads::new(),
            running: FuturesUnordered::new(),
        }
    }

    /// Run `load` and hand its output to `apply` once it resolves.
    pub fn spawn<T, F, A>(&mut self, load: F, apply: A)
    where
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
        A: FnOnce(&mut S, &mut Context, T) -> anyhow::Result<()> + 'static,
    {
        let ticket = self.pending.enqueue();
        self.running.push(Box::pin(async move {
            let result = load.await.map(|value| -> Apply<S> {
                Box::new(move |sketch: &mut S, ctx: &mut Context| apply(sketch, ctx, value))
            });
            (ticket, result)
        }));
    }

    /// Enqueue a load the sketch settles itself through [`complete`](Self::complete)
    /// or [`fail`](Self::fail).
    pub fn enqueue(&mut self) -> LoadTicket {
        self.pending.enqueue()
    }

    pub fn complete(&mut self, ticket: LoadTicket) {
        self.pending.complete(ticket);
    }

    pub fn fail(&mut self, ticket: LoadTicket, reason: impl Into<String>) {
        self.pending.fail(ticket, reason);
    }

    pub fn pending(&self) -> &PendingLoads {
        &self.pending
    }

    pub(crate) fn begin(&mut self, now: Instant) {
        self.pending.begin(now);
    }

    /// Poll every running load once and apply those that finished. Returns the
    /// number settled by this call.
    pub(crate) fn poll(&mut self, sketch: &mut S, ctx: &mut Context) -> usize {
        let mut cx = std::task::Context::from_waker(futures::task::noop_waker_ref());
        let mut settled = 0;
        while let Poll::Ready(Some((ticket, result))) = self.running.poll_next_unpin(&mut cx) {
            settled += 1;
            match result.and_then(|apply| apply(sketch, ctx)) {
                Ok(()) => self.pending.complete(ticket),
                Err(e) => self
                    .pending
                    .fail(ticket, LoadError::Failed(format!("{e:#}")).to_string()),
            }
        }
        settled
    }
}

/// Fixed-rate timer without catch-up.
///
/// When a poll comes in late the next deadline is moved past `now` by whole
/// periods, so at most one pulse fires per poll.
#[derive(Clone, Copy, Debug)]
pub struct Pulse {
    period: Duration,
    next: Instant,
    last: Instant,
}

impl Pulse {
    pub fn new(hz: u32, now: Instant) -> Self {
        let period = Self::period_of(hz);
        Self {
            period,
            next: now + period,
            last: now,
        }
    }

    fn period_of(hz: u32) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(hz.max(1)))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Change the rate. The current deadline is kept.
    pub fn set_rate(&mut self, hz: u32) {
        self.period = Self::period_of(hz);
    }

    /// If a pulse is due at `now`, return the time since the previous one.
    pub fn poll(&mut self, now: Instant) -> Option<Duration> {
        if now < self.next {
            return None;
        }
        let lag = (now - self.next).as_nanos();
        let period = self.period.as_nanos().max(1);
        // smallest whole number of periods that puts the deadline after `now`
        let periods = (lag / period + 1) as u32;
        self.next += self.period * periods;
        let dt = now - self.last;
        self.last = now;
        Some(dt)
    }
}

/// An application driven by [`run`].
pub trait Sketch: Sized + 'static {
    /// Called once after the GPU context exists. Enqueue asynchronous work on
    /// `loads`; [`on_start`](Self::on_start) waits until all of it settled.
    fn on_load(&mut self, ctx: &mut Context, loads: &mut Loads<Self>) -> anyhow::Result<()>;

    /// Called once when the load barrier opens.
    fn on_start(&mut self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called at the pulse rate with the time since the previous pulse.
    fn on_pulse(&mut self, _ctx: &mut Context, _dt: Duration) {}

    /// Record this frame's draws into the cleared swapchain pass. Not called
    /// before [`on_start`](Self::on_start).
    fn on_render(&self, ctx: &Context, pass: &mut wgpu::RenderPass<'_>) -> Result<(), RenderError>;

    fn on_window_event(&mut self, _ctx: &mut Context, _event: &WindowEvent) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Created,
    Loading,
    Running,
}

pub(crate) enum HostEvent {
    #[allow(dead_code)]
    Ready(Box<Context>),
    #[allow(dead_code)]
    Failed(String),
}

struct App<S: Sketch> {
    #[allow(dead_code)]
    proxy: winit::event_loop::EventLoopProxy<HostEvent>,
    config: EngineConfig,
    sketch: S,
    loads: Loads<S>,
    ctx: Option<Context>,
    phase: Phase,
    pulse: Option<Pulse>,
    render_failing: bool,
    error: Option<anyhow::Error>,
}

impl<S: Sketch> App<S> {
    fn new(event_loop: &EventLoop<HostEvent>, sketch: S, config: EngineConfig) -> Self {
        Self {
            proxy: event_loop.create_proxy(),
            config,
            sketch,
            loads: Loads::new(),
            ctx: None,
            phase: Phase::Created,
            pulse: None,
            render_failing: false,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn ready(&mut self, event_loop: &ActiveEventLoop, mut ctx: Context) {
        self.loads.begin(Instant::now());
        if let Err(e) = self.sketch.on_load(&mut ctx, &mut self.loads) {
            return self.fail(event_loop, e.context("load hook failed"));
        }
        log::info!("Load hook enqueued {} load(s)", self.loads.pending().issued());
        self.phase = Phase::Loading;
        ctx.window.request_redraw();
        self.ctx = Some(ctx);
    }

    /// Advance loads, the barrier and the pulse for this frame.
    fn step(&mut self) -> anyhow::Result<()> {
        let Some(ctx) = self.ctx.as_mut() else {
            return Ok(());
        };
        let now = Instant::now();
        match self.phase {
            Phase::Created => {}
            Phase::Loading => {
                self.loads.poll(&mut self.sketch, ctx);
                if self
                    .loads
                    .pending()
                    .poll_barrier(now, self.config.load_timeout)?
                {
                    let failures = self.loads.pending().failures().len();
                    if failures > 0 {
                        log::warn!("Starting with {failures} failed load(s)");
                    }
                    self.sketch.on_start(ctx)?;
                    self.pulse = Some(Pulse::new(ctx.frame_rate(), now));
                    self.phase = Phase::Running;
                    log::info!("Sketch started");
                }
            }
            Phase::Running => {
                if let Some(pulse) = &mut self.pulse {
                    if let Some(dt) = pulse.poll(now) {
                        self.sketch.on_pulse(ctx, dt);
                        pulse.set_rate(ctx.frame_rate());
                    }
                }
            }
        }
        Ok(())
    }

    /// Render one frame and present it.
    fn draw(&mut self) -> Result<(), RenderError> {
        let Some(ctx) = self.ctx.as_mut() else {
            return Ok(());
        };
        let output = match ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                ctx.surface.configure(&ctx.device, &ctx.config);
                return Ok(());
            }
            e => {
                log::error!("Could not acquire surface texture: {e:?}");
                return Ok(());
            }
        };
        ctx.swapchain.refresh(output);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        let running = self.phase == Phase::Running;
        let drawn = {
            let sketch = &self.sketch;
            let ctx = &*ctx;
            ctx.swapchain
                .clear(&mut encoder, ctx.clear_colour, |pass| {
                    if running {
                        sketch.on_render(ctx, pass)
                    } else {
                        Ok(())
                    }
                })
        };
        // a failing draw still presents the cleared frame
        match drawn {
            Ok(()) => self.render_failing = false,
            Err(e) if !self.render_failing => {
                log::error!("Render hook failed: {e}");
                self.render_failing = true;
            }
            Err(_) => {}
        }

        let frame = ctx.swapchain.flush(&mut encoder)?;
        ctx.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl<S: Sketch> ApplicationHandler<HostEvent> for App<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.phase != Phase::Created || self.ctx.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.width,
                self.config.height,
            ));

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = wgpu::web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            if let Some(canvas) = canvas {
                window_attributes = window_attributes.with_canvas(Some(canvas.unchecked_into()));
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, anyhow::anyhow!("cannot create the window: {e}")),
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match futures::executor::block_on(Context::new(window, &self.config)) {
                Ok(ctx) => self.ready(event_loop, ctx),
                Err(e) => self.fail(event_loop, e.context("cannot create the GPU context")),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let config = self.config.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match Context::new(window, &config).await {
                    Ok(ctx) => HostEvent::Ready(Box::new(ctx)),
                    Err(e) => HostEvent::Failed(format!("{e:#}")),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("Event loop closed before the GPU context was ready");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: HostEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            HostEvent::Ready(ctx) => self.ready(event_loop, *ctx),
            HostEvent::Failed(e) => self.fail(
                event_loop,
                anyhow::anyhow!("cannot create the GPU context: {e}"),
            ),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };

        if let WindowEvent::Resized(size) = event {
            ctx.resize(size.width, size.height);
        }
        if self.phase == Phase::Running {
            self.sketch.on_window_event(ctx, &event);
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.step() {
                    return self.fail(event_loop, e);
                }
                if let Err(e) = self.draw() {
                    log::error!("Frame dropped: {e}");
                }
                if let Some(ctx) = &self.ctx {
                    ctx.window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Open a window and drive `sketch` until the window closes.
///
/// Fails if the window or GPU context cannot be created, if a lifecycle hook
/// returns an error, or if the load barrier does not open within the
/// configured timeout.
pub fn run<S: Sketch>(sketch: S, config: EngineConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<HostEvent> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        EventLoop::with_user_event().with_any_thread(true).build()?
    };

    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    let event_loop: EventLoop<HostEvent> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        EventLoop::with_user_event().with_any_thread(true).build()?
    };

    #[cfg(not(all(
        feature = "integration-tests",
        any(target_os = "linux", target_os = "windows")
    )))]
    let event_loop: EventLoop<HostEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, sketch, config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
