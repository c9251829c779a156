use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::info;
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{
    ElementState, Event, KeyboardInput, MouseButton as WinitMouseButton, WindowEvent,
};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::WindowBuilder;

use neuro_atlas::app::{
    build_draw_items, camera_params, light_params, pick_candidates, print_census, MeshLibrary,
    WindowViewport,
};
use neuro_atlas::{
    AtlasBundle, AtlasDocument, AtlasModel, CameraSpec, ClipAxis, ClipConfig, Hud, InputState,
    KeyCode, LayerToggles, LightSpec, NamedKey, QuizController, Ray, RegionKind, Renderer,
    SelectionState, Verdict,
};

/// Clip offset change per frame while an arrow key is held.
const CLIP_STEP: f32 = 0.02;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let bundle = Arc::new(
        AtlasBundle::open(&options.path)
            .with_context(|| format!("failed to open bundle {}", options.path))?,
    );
    let atlas = AtlasDocument::from_xml(bundle.atlas_xml()).context("failed to parse atlas XML")?;

    let interactive = atlas.structures.iter().filter(|s| s.is_interactive()).count();
    println!(
        "Loaded atlas with {} structures ({} interactive)",
        atlas.structures.len(),
        interactive
    );

    let model = AtlasModel::from_structures(atlas.structures.clone());
    print_census(&model);

    if options.summary_only {
        return Ok(());
    }

    match run_interactive(bundle, atlas, model.clone(), options.seed) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn run_interactive(
    bundle: Arc<AtlasBundle>,
    atlas: AtlasDocument,
    model: AtlasModel,
    seed: Option<u64>,
) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop =
        event_loop.map_err(|panic| WindowInitError::from_panic("event loop", panic))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Neuro Atlas")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let renderer = block_on(Renderer::new(Arc::clone(&window), Arc::clone(&bundle)))
        .map_err(|err| WindowInitError::from_error("GPU renderer", err))?;
    let library = MeshLibrary::from_bundle(&bundle);
    info!("loaded {} bundled meshes", library.len());
    let viewport = Arc::new(WindowViewport::new(
        window.inner_size().width,
        window.inner_size().height,
    ));

    let quiz = match QuizController::new(&atlas.structures, seed) {
        Ok(quiz) => Some(quiz),
        Err(err) => {
            log::warn!("quiz disabled: {err}");
            None
        }
    };

    let camera = atlas.camera.unwrap_or_default();
    let light = atlas.light.unwrap_or_default();

    let mut app = AppState {
        renderer,
        model,
        library,
        input: Arc::new(InputState::new()),
        viewport,
        selection: SelectionState::new(),
        quiz,
        hud: Hud::new(),
        layers: LayerToggles::default(),
        clip: ClipConfig::default(),
        camera,
        light,
        last_error: None,
    };

    let mut event_loop = event_loop;
    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        if let Err(err) = app.process_event(&event, control_flow) {
            app.last_error = Some(err);
            control_flow.set_exit();
        }
    });

    app.shutdown();

    if let Some(err) = app.last_error {
        return Err(err);
    }

    Ok(())
}

struct AppState {
    renderer: Renderer,
    model: AtlasModel,
    library: MeshLibrary,
    input: Arc<InputState>,
    viewport: Arc<WindowViewport>,
    selection: SelectionState,
    quiz: Option<QuizController>,
    hud: Hud,
    layers: LayerToggles,
    clip: ClipConfig,
    camera: CameraSpec,
    light: LightSpec,
    last_error: Option<anyhow::Error>,
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

impl AppState {
    fn process_event(
        &mut self,
        event: &Event<'_, ()>,
        control_flow: &mut ControlFlow,
    ) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => {
                        control_flow.set_exit();
                    }
                    WindowEvent::Resized(size) => {
                        self.renderer.resize(*size);
                        self.viewport.update(size.width, size.height);
                    }
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        self.renderer.resize(**new_inner_size);
                        self.viewport
                            .update(new_inner_size.width, new_inner_size.height);
                    }
                    WindowEvent::KeyboardInput { input, .. } => {
                        self.handle_keyboard(input);
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        self.handle_mouse_button(*state, *button);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let pos = Vec2::new(position.x as f32, position.y as f32);
                        self.input.set_pointer(pos);
                    }
                    _ => {}
                }
            }
            Event::RedrawRequested(window_id) if *window_id == self.renderer.window_id() => {
                self.frame()?;
            }
            Event::MainEventsCleared => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    /// Per-frame work: feedback expiry, held-key clip nudging, hover
    /// picking, and the draw submission.
    fn frame(&mut self) -> Result<()> {
        self.hud.tick(Instant::now());
        self.nudge_clip_from_held_keys();

        let snapshot = self.model.snapshot();
        let camera = camera_params(&self.camera, self.aspect());

        let hovered = self.cast_pointer_ray(&camera).and_then(|ray| {
            neuro_atlas::pick(&ray, pick_candidates(&snapshot, &self.layers, &self.library))
        });
        self.selection.set_hover(
            hovered
                .as_ref()
                .filter(|hit| hit.interactive)
                .map(|hit| hit.name.as_str()),
        );

        let items = build_draw_items(&snapshot, &self.layers, &self.selection);
        self.renderer
            .update_globals(&camera, &light_params(&self.light), self.clip.plane());
        if let Err(err) = self.renderer.render(&items) {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    info!("Surface timeout; retrying next frame");
                }
            }
        }

        self.renderer.window().set_title(&self.hud.title_line());
        Ok(())
    }

    fn aspect(&self) -> f32 {
        let (width, height) = self.viewport.size();
        width as f32 / height as f32
    }

    fn cast_pointer_ray(&self, camera: &neuro_atlas::CameraParams) -> Option<Ray> {
        Ray::from_cursor(self.input.pointer(), self.viewport.size(), camera.view_proj)
    }

    fn handle_click(&mut self) {
        let snapshot = self.model.snapshot();
        let camera = camera_params(&self.camera, self.aspect());
        let hit = self.cast_pointer_ray(&camera).and_then(|ray| {
            neuro_atlas::pick(&ray, pick_candidates(&snapshot, &self.layers, &self.library))
        });

        match hit {
            Some(hit) if hit.interactive => {
                self.selection.select(Some(&hit.name));
                if let Some(structure) = self.model.get(&hit.name) {
                    self.hud.show_info(&structure.name, structure.detail());
                    if let Some(text) = self.hud.info_text() {
                        info!("{text}");
                    }
                }
                self.evaluate_answer(Some(&hit.name));
            }
            // Clicks absorbed by a decorative mesh leave the selection,
            // score, and queue untouched.
            Some(_) => {}
            None => {
                self.selection.select(None);
                self.hud.clear_info();
                self.evaluate_answer(None);
            }
        }
    }

    fn evaluate_answer(&mut self, clicked: Option<&str>) {
        let Some(quiz) = self.quiz.as_mut() else {
            return;
        };
        let verdict = quiz.answer(clicked);
        let now = Instant::now();
        self.hud.apply_verdict(&verdict, now);
        self.hud.set_score(quiz.score());
        self.hud
            .set_prompt(quiz.current_task().map(|task| task.prompt.clone()));
        if let Some(feedback) = self.hud.feedback() {
            info!("{feedback}");
        }
        if let Verdict::Correct {
            advanced_to: Some(mode),
            ..
        } = verdict
        {
            info!("quiz mode complete, now: {}", mode.title());
        }
    }

    fn advance_quiz(&mut self) {
        let Some(quiz) = self.quiz.as_mut() else {
            return;
        };
        let mode = quiz.advance_mode();
        self.hud.set_mode(mode);
        self.hud
            .set_prompt(quiz.current_task().map(|task| task.prompt.clone()));
        self.hud
            .show_feedback(format!("Starting: {}", mode.title()), Instant::now());
        info!("quiz mode: {}", mode.title());
    }

    fn nudge_clip_from_held_keys(&mut self) {
        if !self.clip.enabled {
            return;
        }
        if self.input.is_key_down(KeyCode::Named(NamedKey::Right)) {
            self.clip.nudge(CLIP_STEP);
        }
        if self.input.is_key_down(KeyCode::Named(NamedKey::Left)) {
            self.clip.nudge(-CLIP_STEP);
        }
    }

    fn handle_keyboard(&mut self, input: &KeyboardInput) {
        let Some(keycode) = input.virtual_keycode.and_then(map_keycode) else {
            return;
        };
        match input.state {
            ElementState::Pressed => {
                self.input.set_key_down(keycode);
                self.handle_binding(keycode);
            }
            ElementState::Released => self.input.set_key_up(keycode),
        }
    }

    fn handle_binding(&mut self, keycode: KeyCode) {
        match keycode {
            KeyCode::Digit(1) => self.toggle_layer(RegionKind::Lobe),
            KeyCode::Digit(2) => self.toggle_layer(RegionKind::DeepStructure),
            KeyCode::Digit(3) => self.toggle_layer(RegionKind::CranialNerve),
            KeyCode::Character('X') => self.clip.axis = ClipAxis::X,
            KeyCode::Character('Y') => self.clip.axis = ClipAxis::Y,
            KeyCode::Character('Z') => self.clip.axis = ClipAxis::Z,
            KeyCode::Character('C') => {
                self.clip.enabled = !self.clip.enabled;
                info!(
                    "clipping {} (axis {})",
                    if self.clip.enabled { "on" } else { "off" },
                    self.clip.axis.label()
                );
            }
            KeyCode::Character('N') => self.clip.negate = !self.clip.negate,
            KeyCode::Named(NamedKey::Tab) => self.advance_quiz(),
            KeyCode::Named(NamedKey::Escape) => {
                self.selection.select(None);
                self.hud.clear_info();
            }
            _ => {}
        }
    }

    fn toggle_layer(&mut self, region: RegionKind) {
        let visible = self.layers.toggle(region);
        info!(
            "{} layer {}",
            region.label(),
            if visible { "shown" } else { "hidden" }
        );
    }

    fn handle_mouse_button(&mut self, state: ElementState, button: WinitMouseButton) {
        let index = match button {
            WinitMouseButton::Left => 0,
            WinitMouseButton::Right => 1,
            WinitMouseButton::Middle => 2,
            WinitMouseButton::Other(value) => value,
        };
        let button = neuro_atlas::MouseButton::new(index);
        match state {
            ElementState::Pressed => {
                self.input.set_mouse_button_down(button);
                if button == neuro_atlas::MouseButton::LEFT {
                    self.handle_click();
                }
            }
            ElementState::Released => self.input.set_mouse_button_up(button),
        }
    }

    fn shutdown(&mut self) {
        if let Some(quiz) = &self.quiz {
            println!("Final score: {}", quiz.score());
        }
        print_census(&self.model);
    }
}

fn map_keycode(code: winit::event::VirtualKeyCode) -> Option<KeyCode> {
    use winit::event::VirtualKeyCode as Key;
    Some(match code {
        Key::Tab => KeyCode::Named(NamedKey::Tab),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::Left => KeyCode::Named(NamedKey::Left),
        Key::Right => KeyCode::Named(NamedKey::Right),
        Key::Up => KeyCode::Named(NamedKey::Up),
        Key::Down => KeyCode::Named(NamedKey::Down),
        Key::Key1 => KeyCode::Digit(1),
        Key::Key2 => KeyCode::Digit(2),
        Key::Key3 => KeyCode::Digit(3),
        Key::C => KeyCode::Character('C'),
        Key::N => KeyCode::Character('N'),
        Key::X => KeyCode::Character('X'),
        Key::Y => KeyCode::Character('Y'),
        Key::Z => KeyCode::Character('Z'),
        _ => return None,
    })
}

struct CliOptions {
    path: String,
    summary_only: bool,
    seed: Option<u64>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!(
                "Usage: neuro-atlas <bundle.atlas> [--summary-only] [--seed N]"
            ));
        };
        let mut summary_only = false;
        let mut seed = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--seed" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--seed requires a value"))?;
                    seed = Some(
                        value
                            .parse::<u64>()
                            .with_context(|| format!("invalid seed: {value}"))?,
                    );
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --summary-only or --seed N"
                    ));
                }
            }
        }
        Ok(Self {
            path,
            summary_only,
            seed,
        })
    }
}
