//! Session lifecycle, load generation and camera framing tests.
//!
//! These run against a recording backend, so no GPU is needed.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use volscope::*;
use volscope_render::RenderResult;

type EventLog = Arc<Mutex<Vec<String>>>;

fn push(log: &EventLog, event: impl Into<String>) {
    log.lock().unwrap().push(event.into());
}

struct RecWindow(EventLog);

impl Drop for RecWindow {
    fn drop(&mut self) {
        push(&self.0, "drop window");
    }
}

struct RecRenderer {
    camera: Camera,
    actors: Vec<PipelineId>,
    log: EventLog,
}

impl Drop for RecRenderer {
    fn drop(&mut self) {
        push(&self.log, "drop renderer");
    }
}

struct RecView(EventLog);

impl Drop for RecView {
    fn drop(&mut self) {
        push(&self.0, "drop view");
    }
}

struct RecInteractor {
    inner: CameraInteractor,
    log: EventLog,
}

impl AsRef<CameraInteractor> for RecInteractor {
    fn as_ref(&self) -> &CameraInteractor {
        &self.inner
    }
}

impl AsMut<CameraInteractor> for RecInteractor {
    fn as_mut(&mut self) -> &mut CameraInteractor {
        &mut self.inner
    }
}

impl Drop for RecInteractor {
    fn drop(&mut self) {
        push(&self.log, "drop interactor");
    }
}

#[derive(Default)]
struct RecordingBackend {
    log: EventLog,
    fail_view: bool,
}

impl RecordingBackend {
    fn new() -> (Self, EventLog) {
        let backend = Self::default();
        let log = Arc::clone(&backend.log);
        (backend, log)
    }
}

impl RenderBackend for RecordingBackend {
    type Window = RecWindow;
    type Renderer = RecRenderer;
    type View = RecView;
    type Interactor = RecInteractor;

    fn create_window(&mut self) -> RenderResult<RecWindow> {
        push(&self.log, "create window");
        Ok(RecWindow(Arc::clone(&self.log)))
    }

    fn create_renderer(&mut self, _window: &RecWindow, _background: Vec3) -> RenderResult<RecRenderer> {
        push(&self.log, "create renderer");
        Ok(RecRenderer {
            camera: Camera::default(),
            actors: Vec::new(),
            log: Arc::clone(&self.log),
        })
    }

    fn create_view(
        &mut self,
        _window: &RecWindow,
        _surface: SurfaceHandle,
        width: u32,
        height: u32,
    ) -> RenderResult<RecView> {
        if self.fail_view {
            return Err(RenderError::SurfaceConfigurationFailed("no surface".to_string()));
        }
        push(&self.log, format!("create view {width}x{height}"));
        Ok(RecView(Arc::clone(&self.log)))
    }

    fn create_interactor(&mut self, _view: &RecView) -> RenderResult<RecInteractor> {
        push(&self.log, "create interactor");
        Ok(RecInteractor {
            inner: CameraInteractor::new(1, 1),
            log: Arc::clone(&self.log),
        })
    }

    fn camera(renderer: &RecRenderer) -> &Camera {
        &renderer.camera
    }

    fn camera_mut(renderer: &mut RecRenderer) -> &mut Camera {
        &mut renderer.camera
    }

    fn upload_actor(
        &mut self,
        _window: &RecWindow,
        renderer: &mut RecRenderer,
        actor: &Actor,
    ) -> RenderResult<()> {
        push(&self.log, format!("upload {}", actor.id.get()));
        if !renderer.actors.contains(&actor.id) {
            renderer.actors.push(actor.id);
        }
        Ok(())
    }

    fn remove_actor(&mut self, renderer: &mut RecRenderer, id: PipelineId) -> bool {
        let before = renderer.actors.len();
        renderer.actors.retain(|a| *a != id);
        renderer.actors.len() != before
    }

    fn resize_view(
        &mut self,
        _window: &RecWindow,
        _view: &mut RecView,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        push(&self.log, format!("resize {width}x{height}"));
        Ok(())
    }

    fn render(
        &mut self,
        _window: &RecWindow,
        _renderer: &mut RecRenderer,
        _view: &mut RecView,
    ) -> RenderResult<()> {
        push(&self.log, "render");
        Ok(())
    }

    fn capture(&mut self, _window: &RecWindow, _view: &RecView) -> RenderResult<Frame> {
        Ok(Frame {
            width: 1,
            height: 1,
            pixels: vec![0, 0, 0, 255],
        })
    }
}

fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn clear(log: &EventLog) {
    log.lock().unwrap().clear();
}

fn count(log: &EventLog, event: &str) -> usize {
    log.lock().unwrap().iter().filter(|e| *e == event).count()
}

/// Options under which lifecycle violations are returned instead of panicking.
fn reporting() -> Options {
    Options {
        strict_lifecycle: false,
        ..Options::default()
    }
}

fn attached_session() -> (RenderSession<RecordingBackend>, EventLog) {
    init_logging();
    let (backend, log) = RecordingBackend::new();
    let mut session = RenderSession::new(backend, reporting());
    session.attach_view(SurfaceHandle::Offscreen, 640, 480).unwrap();
    clear(&log);
    (session, log)
}

fn rgba_grid(dims: UVec3, origin: Vec3) -> Arc<GridDataset> {
    let len = (dims.x * dims.y * dims.z * 4) as usize;
    Arc::new(GridDataset::new(dims, Vec3::ONE, origin, 4, vec![200; len]).unwrap())
}

fn ready_volume(dims: UVec3, origin: Vec3) -> TransferPipeline {
    let mut pipeline = TransferPipeline::volume();
    pipeline.bind(rgba_grid(dims, origin)).unwrap();
    pipeline
}

fn rgb_grid() -> GridDataset {
    GridDataset::with_unit_spacing(UVec3::new(2, 1, 1), 3, vec![10, 20, 30, 200, 150, 100]).unwrap()
}

// --- Attach / release ---

#[test]
fn test_attach_creates_in_dependency_order() {
    let (backend, log) = RecordingBackend::new();
    let mut session = RenderSession::new(backend, reporting());
    session.attach_view(SurfaceHandle::Offscreen, 320, 200).unwrap();

    assert_eq!(
        events(&log),
        vec!["create window", "create renderer", "create view 320x200", "create interactor"]
    );
    assert_eq!(session.state(), SessionState::Attached);
    assert_eq!(session.size(), (320, 200));
    assert!((session.camera().unwrap().aspect_ratio - 1.6).abs() < 1e-6);
}

#[test]
fn test_release_tears_down_in_reverse_order() {
    let (mut session, log) = attached_session();
    session.release();

    assert_eq!(
        events(&log),
        vec!["drop interactor", "drop view", "drop renderer", "drop window"]
    );
    assert_eq!(session.state(), SessionState::Detached);
    assert!(session.camera().is_none());
}

#[test]
fn test_release_is_idempotent() {
    let (mut session, log) = attached_session();
    session.release();
    let after_first = events(&log);
    session.release();
    assert_eq!(events(&log), after_first);
    assert_eq!(session.state(), SessionState::Detached);
    assert_eq!(session.size(), (0, 0));
    assert!(session.pipeline_ids().is_empty());
}

#[test]
fn test_release_never_attached_is_noop() {
    let (backend, log) = RecordingBackend::new();
    let mut session = RenderSession::new(backend, reporting());
    session.release();
    assert!(events(&log).is_empty());
    assert_eq!(session.state(), SessionState::Detached);
}

#[test]
fn test_drop_tears_down_in_reverse_order() {
    let (session, log) = attached_session();
    drop(session);
    assert_eq!(
        events(&log),
        vec!["drop interactor", "drop view", "drop renderer", "drop window"]
    );
}

#[test]
fn test_attach_twice_fails() {
    let (mut session, log) = attached_session();
    let err = session
        .attach_view(SurfaceHandle::Offscreen, 10, 10)
        .unwrap_err();
    assert!(matches!(err, VolumeError::ViewAlreadyAttached));
    assert!(events(&log).is_empty());
    assert_eq!(session.state(), SessionState::Attached);
    assert_eq!(session.size(), (640, 480));
}

#[test]
fn test_reattach_after_release() {
    let (mut session, log) = attached_session();
    session.release();
    clear(&log);
    session.attach_view(SurfaceHandle::Offscreen, 64, 64).unwrap();
    assert_eq!(count(&log, "create window"), 1);
    assert!(session.is_attached());
}

#[test]
fn test_failed_attach_rolls_back() {
    let (mut backend, log) = RecordingBackend::new();
    backend.fail_view = true;
    let mut session = RenderSession::new(backend, reporting());

    let err = session
        .attach_view(SurfaceHandle::Offscreen, 64, 64)
        .unwrap_err();
    assert!(matches!(err, VolumeError::Render(_)));
    assert_eq!(
        events(&log),
        vec!["create window", "create renderer", "drop renderer", "drop window"]
    );
    assert_eq!(session.state(), SessionState::Detached);
}

// --- Lifecycle guards ---

#[test]
fn test_detached_operations_fail() {
    let (backend, log) = RecordingBackend::new();
    let mut session = RenderSession::new(backend, reporting());
    let pipeline = ready_volume(UVec3::splat(2), Vec3::ZERO);

    assert!(matches!(
        session.add_pipeline(&pipeline),
        Err(VolumeError::SessionNotAttached)
    ));
    assert!(matches!(
        session.resize(10, 10),
        Err(VolumeError::SessionNotAttached)
    ));
    assert!(matches!(session.render(), Err(VolumeError::SessionNotAttached)));
    assert!(matches!(
        session.interact(&InteractionEvent::Scroll { delta: 1.0 }),
        Err(VolumeError::SessionNotAttached)
    ));
    assert!(matches!(session.capture(), Err(VolumeError::SessionNotAttached)));
    assert!(matches!(
        session.remove_pipeline(pipeline.id()),
        Err(VolumeError::SessionNotAttached)
    ));
    assert!(events(&log).is_empty());
}

#[test]
fn test_operations_after_release_fail() {
    let (mut session, _log) = attached_session();
    session.release();
    let pipeline = ready_volume(UVec3::splat(2), Vec3::ZERO);
    assert!(matches!(
        session.add_pipeline(&pipeline),
        Err(VolumeError::SessionNotAttached)
    ));
    assert!(matches!(
        session.resize(100, 100),
        Err(VolumeError::SessionNotAttached)
    ));
}

#[test]
fn test_lifecycle_is_strict_in_debug_builds() {
    let (backend, _log) = RecordingBackend::new();
    let session = RenderSession::new(backend, Options::default());
    assert_eq!(session.options().strict_lifecycle, cfg!(debug_assertions));
}

#[test]
#[should_panic(expected = "add_pipeline called while detached")]
fn test_strict_lifecycle_panics() {
    let (backend, _log) = RecordingBackend::new();
    let options = Options {
        strict_lifecycle: true,
        ..Options::default()
    };
    let mut session = RenderSession::new(backend, options);
    let pipeline = ready_volume(UVec3::splat(2), Vec3::ZERO);
    let _ = session.add_pipeline(&pipeline);
}

// --- Pipelines ---

#[test]
fn test_add_unbound_pipeline_fails() {
    let (mut session, log) = attached_session();
    let pipeline = TransferPipeline::volume();
    assert!(matches!(
        session.add_pipeline(&pipeline),
        Err(VolumeError::PipelineNotReady)
    ));
    assert!(events(&log).is_empty());
}

#[test]
fn test_add_pipeline_uploads_fits_and_renders() {
    let (mut session, log) = attached_session();
    let pipeline = ready_volume(UVec3::new(5, 3, 9), Vec3::new(10.0, 0.0, 0.0));
    session.add_pipeline(&pipeline).unwrap();

    assert_eq!(
        events(&log),
        vec![format!("upload {}", pipeline.id().get()), "render".to_string()]
    );
    assert_eq!(session.pipeline_ids(), vec![pipeline.id()]);
    let camera = session.camera().unwrap();
    assert_eq!(camera.target, Vec3::new(12.0, 1.0, 4.0));
}

#[test]
fn test_readd_pipeline_replaces_actor() {
    let (mut session, _log) = attached_session();
    let mut first = ready_volume(UVec3::splat(2), Vec3::ZERO);
    let second = ready_volume(UVec3::splat(2), Vec3::splat(5.0));
    session.add_pipeline(&first).unwrap();
    session.add_pipeline(&second).unwrap();

    first.bind(rgba_grid(UVec3::splat(4), Vec3::ZERO)).unwrap();
    session.add_pipeline(&first).unwrap();
    assert_eq!(session.pipeline_ids(), vec![first.id(), second.id()]);
    let (min, max) = session.bounds().unwrap();
    assert_eq!(min, Vec3::splat(-0.5));
    assert_eq!(max, Vec3::splat(6.5));
}

#[test]
fn test_multiple_actors_fit_union_of_bounds() {
    let (mut session, _log) = attached_session();
    let a = ready_volume(UVec3::splat(3), Vec3::ZERO);
    let b = ready_volume(UVec3::new(2, 2, 5), Vec3::new(10.0, -4.0, 0.0));
    session.add_pipeline(&a).unwrap();
    session.add_pipeline(&b).unwrap();

    let (min, max) = session.bounds().unwrap();
    // Drawn extents reach half a voxel past the outermost voxel centers.
    assert_eq!(min, Vec3::new(-0.5, -4.5, -0.5));
    assert_eq!(max, Vec3::new(11.5, 2.5, 4.5));

    let camera = session.camera().unwrap();
    assert_eq!(camera.target, (min + max) * 0.5);
    let view_proj = camera.view_projection_matrix();
    for corner in [min, max, Vec3::new(min.x, max.y, min.z), Vec3::new(max.x, min.y, max.z)] {
        let ndc = view_proj.project_point3(corner);
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{corner:?} -> {ndc:?}");
        assert!((0.0..=1.0).contains(&ndc.z), "{corner:?} -> {ndc:?}");
    }
}

#[test]
fn test_remove_pipeline_refits_camera() {
    let (mut session, log) = attached_session();
    let a = ready_volume(UVec3::splat(3), Vec3::ZERO);
    let b = ready_volume(UVec3::splat(3), Vec3::splat(100.0));
    session.add_pipeline(&a).unwrap();
    session.add_pipeline(&b).unwrap();
    clear(&log);

    assert!(session.remove_pipeline(b.id()).unwrap());
    assert_eq!(session.pipeline_ids(), vec![a.id()]);
    assert_eq!(session.camera().unwrap().target, Vec3::ONE);
    assert_eq!(events(&log), vec!["render"]);

    assert!(!session.remove_pipeline(b.id()).unwrap());
}

#[test]
fn test_slice_pipeline_in_session() {
    let (mut session, _log) = attached_session();
    let mut pipeline = TransferPipeline::slice();
    pipeline.bind(rgba_grid(UVec3::new(4, 4, 8), Vec3::ZERO)).unwrap();
    pipeline.configure_slice(SlicingAxis::Z, 128.0, 64.0).unwrap();
    session.add_pipeline(&pipeline).unwrap();
    assert_eq!(session.pipeline_ids(), vec![pipeline.id()]);
}

// --- Resize / interact ---

#[test]
fn test_resize_same_size_is_noop() {
    let (mut session, log) = attached_session();
    session.resize(640, 480).unwrap();
    assert!(events(&log).is_empty());
}

#[test]
fn test_resize_propagates_and_renders() {
    let (mut session, log) = attached_session();
    session.resize(800, 400).unwrap();
    assert_eq!(events(&log), vec!["resize 800x400", "render"]);
    assert_eq!(session.size(), (800, 400));
    assert!((session.camera().unwrap().aspect_ratio - 2.0).abs() < 1e-6);
}

#[test]
fn test_resize_clamps_zero() {
    let (mut session, log) = attached_session();
    session.resize(0, 0).unwrap();
    assert_eq!(session.size(), (1, 1));
    assert_eq!(events(&log), vec!["resize 1x1", "render"]);
}

#[test]
fn test_interact_moves_camera_and_renders() {
    let (mut session, log) = attached_session();
    session
        .add_pipeline(&ready_volume(UVec3::splat(4), Vec3::ZERO))
        .unwrap();
    clear(&log);
    let before = session.camera().unwrap().distance();

    assert!(session.interact(&InteractionEvent::Scroll { delta: 2.0 }).unwrap());
    assert!(session.camera().unwrap().distance() < before);
    assert_eq!(events(&log), vec!["render"]);

    assert!(!session.interact(&InteractionEvent::Scroll { delta: 0.0 }).unwrap());
    assert_eq!(count(&log, "render"), 1);
}

// --- Load generations ---

#[test]
fn test_current_load_is_applied() {
    let (mut session, log) = attached_session();
    let mut pipeline = TransferPipeline::volume();
    let ticket = session.begin_load();

    let outcome = session
        .apply_load(
            LoadedGrid {
                ticket,
                result: Ok(rgb_grid()),
            },
            &mut pipeline,
        )
        .unwrap();

    assert_eq!(outcome, LoadOutcome::Applied);
    assert!(pipeline.is_ready());
    let dataset = pipeline.dataset().unwrap();
    assert_eq!(dataset.scalars(), &[10, 20, 30, 18, 200, 150, 100, 160]);
    assert_eq!(session.pipeline_ids(), vec![pipeline.id()]);
    assert_eq!(count(&log, "render"), 1);
}

#[test]
fn test_load_superseded_by_reattach_is_discarded() {
    let (mut session, log) = attached_session();
    let mut pipeline = TransferPipeline::volume();
    let g1 = session.begin_load();

    session.release();
    session.attach_view(SurfaceHandle::Offscreen, 640, 480).unwrap();
    clear(&log);
    let camera_before = session.camera().unwrap().clone();

    let outcome = session
        .apply_load(
            LoadedGrid {
                ticket: g1,
                result: Ok(rgb_grid()),
            },
            &mut pipeline,
        )
        .unwrap();

    assert_eq!(outcome, LoadOutcome::Discarded);
    assert!(!pipeline.is_ready());
    assert!(session.pipeline_ids().is_empty());
    assert!(events(&log).is_empty());
    let camera_after = session.camera().unwrap();
    assert_eq!(camera_after.position, camera_before.position);
    assert_eq!(camera_after.target, camera_before.target);
}

#[test]
fn test_load_superseded_by_newer_load_is_discarded() {
    let (mut session, _log) = attached_session();
    let mut pipeline = TransferPipeline::volume();
    let g1 = session.begin_load();
    let g2 = session.begin_load();

    let stale = session
        .apply_load(
            LoadedGrid {
                ticket: g1,
                result: Ok(rgb_grid()),
            },
            &mut pipeline,
        )
        .unwrap();
    assert_eq!(stale, LoadOutcome::Discarded);
    assert!(!pipeline.is_ready());

    let fresh = session
        .apply_load(
            LoadedGrid {
                ticket: g2,
                result: Ok(rgb_grid()),
            },
            &mut pipeline,
        )
        .unwrap();
    assert_eq!(fresh, LoadOutcome::Applied);
    assert!(pipeline.is_ready());
}

#[test]
fn test_load_after_release_is_discarded() {
    let (mut session, _log) = attached_session();
    let mut pipeline = TransferPipeline::volume();
    let ticket = session.begin_load();
    session.release();

    let outcome = session
        .apply_load(
            LoadedGrid {
                ticket,
                result: Ok(rgb_grid()),
            },
            &mut pipeline,
        )
        .unwrap();
    assert_eq!(outcome, LoadOutcome::Discarded);
    assert!(!pipeline.is_ready());
}

#[test]
fn test_load_error_binds_nothing() {
    let (mut session, log) = attached_session();
    let mut pipeline = TransferPipeline::volume();
    let ticket = session.begin_load();

    let err = session
        .apply_load(
            LoadedGrid {
                ticket,
                result: Err(VolumeError::Network("connection reset".to_string())),
            },
            &mut pipeline,
        )
        .unwrap_err();
    assert!(matches!(err, VolumeError::Network(_)));
    assert!(!pipeline.is_ready());
    assert!(events(&log).is_empty());
}

#[test]
fn test_load_while_detached_only_binds() {
    let (backend, log) = RecordingBackend::new();
    let mut session = RenderSession::new(backend, reporting());
    let mut pipeline = TransferPipeline::volume();
    let ticket = session.begin_load();

    let outcome = session
        .apply_load(
            LoadedGrid {
                ticket,
                result: Ok(rgb_grid()),
            },
            &mut pipeline,
        )
        .unwrap();
    assert_eq!(outcome, LoadOutcome::Applied);
    assert!(pipeline.is_ready());
    assert!(events(&log).is_empty());

    session.attach_view(SurfaceHandle::Offscreen, 32, 32).unwrap();
    session.add_pipeline(&pipeline).unwrap();
    assert_eq!(session.pipeline_ids(), vec![pipeline.id()]);
}

#[test]
fn test_attach_and_release_advance_generation() {
    let (backend, _log) = RecordingBackend::new();
    let mut session = RenderSession::new(backend, reporting());
    let g0 = session.generation();
    session.attach_view(SurfaceHandle::Offscreen, 8, 8).unwrap();
    let g1 = session.generation();
    session.release();
    let g2 = session.generation();
    assert!(g0 < g1 && g1 < g2);
}

// --- State machine property ---

#[derive(Debug, Clone)]
enum Op {
    Attach,
    Release,
    AddPipeline,
    Resize(u32, u32),
    Render,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Attach),
        Just(Op::Release),
        Just(Op::AddPipeline),
        (0u32..2000, 0u32..2000).prop_map(|(w, h)| Op::Resize(w, h)),
        Just(Op::Render),
    ]
}

proptest! {
    #[test]
    fn prop_not_attached_error_iff_detached(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (backend, _log) = RecordingBackend::new();
        let mut session = RenderSession::new(backend, reporting());
        let pipeline = ready_volume(UVec3::splat(2), Vec3::ZERO);

        for op in ops {
            let was_attached = session.is_attached();
            let result = match op {
                Op::Attach => session.attach_view(SurfaceHandle::Offscreen, 16, 16),
                Op::Release => {
                    session.release();
                    Ok(())
                }
                Op::AddPipeline => session.add_pipeline(&pipeline),
                Op::Resize(w, h) => session.resize(w, h),
                Op::Render => session.render(),
            };
            let not_attached = matches!(result, Err(VolumeError::SessionNotAttached));
            match op {
                Op::AddPipeline | Op::Resize(..) | Op::Render => {
                    prop_assert_eq!(not_attached, !was_attached);
                }
                Op::Attach => {
                    prop_assert_eq!(
                        matches!(result, Err(VolumeError::ViewAlreadyAttached)),
                        was_attached
                    );
                    prop_assert!(session.is_attached());
                }
                Op::Release => prop_assert!(!session.is_attached()),
            }
        }
    }
}
