//! Per-mesh serialized paint task scheduler
//!
//! One task per mesh executes at a time, in submission order; tasks for
//! different meshes run concurrently on the runtime's blocking pool. The
//! calculation itself stays in `vertex-paint`; this module owns validation,
//! queueing, supersession and result delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use vertex_paint::{EngineHooks, MeshId, Request, TaskFailure, TaskResult, run_request};

use crate::config::SchedulerConfig;
use crate::error::SubmitError;
use crate::queue::{MeshQueue, QueuedTask};

/// Entry point for paint and detect task submission.
///
/// Cheap to clone; all clones share the same queues.
#[derive(Clone)]
pub struct PaintScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    config: SchedulerConfig,
    hooks: EngineHooks,
    runtime: Handle,
    queues: Mutex<HashMap<MeshId, MeshQueue>>,
    next_task_id: AtomicU64,
}

/// Caller-side handle to one submitted task.
pub struct ResultHandle {
    task_id: u64,
    mesh: MeshId,
    rx: oneshot::Receiver<TaskResult>,
    runtime: Handle,
}

impl ResultHandle {
    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    pub fn mesh(&self) -> MeshId {
        self.mesh
    }

    /// Await the task's result. `None` means the task was cancelled while
    /// still queued.
    pub async fn wait(self) -> Option<TaskResult> {
        self.rx.await.ok()
    }

    /// Fire-and-forget completion callback, for callers without an async
    /// context of their own. Cancelled tasks never invoke the callback.
    pub fn on_complete(self, callback: impl FnOnce(TaskResult) + Send + 'static) {
        self.runtime.spawn(async move {
            if let Ok(result) = self.rx.await {
                callback(result);
            }
        });
    }
}

impl PaintScheduler {
    pub fn new(config: SchedulerConfig, hooks: EngineHooks, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                hooks,
                runtime,
                queues: Mutex::new(HashMap::new()),
                next_task_id: AtomicU64::new(1),
            }),
        }
    }

    /// Validate and enqueue a request for its mesh's FIFO queue.
    ///
    /// Full-replacement requests first drop queued ordinary tasks for the
    /// same mesh (they complete with `TaskFailure::Superseded`). A full
    /// queue rejects the submission unless it carries `bypass_queue_limit`.
    pub fn submit(&self, mesh: MeshId, request: Request) -> Result<ResultHandle, SubmitError> {
        request.validate(self.inner.hooks.snapshots.vertex_count(mesh))?;

        let task_id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut queues = lock(&self.inner.queues);
            let queue = queues.entry(mesh).or_default();

            if request.supersedes_queued() {
                let dropped = queue.supersede();
                if dropped > 0 {
                    debug!(?mesh, dropped, "full replacement superseded queued tasks");
                }
            }
            if !request.options.bypass_queue_limit
                && queue.pending.len() >= self.inner.config.max_pending_per_mesh
            {
                return Err(SubmitError::QueueOverflow {
                    mesh,
                    pending: queue.pending.len(),
                });
            }
            queue.pending.push_back(QueuedTask {
                task_id,
                request,
                tx,
            });
        }
        self.inner.dispatch_next(mesh);

        Ok(ResultHandle {
            task_id,
            mesh,
            rx,
            runtime: self.inner.runtime.clone(),
        })
    }

    /// Remove a task that is still queued. Returns `false` when it already
    /// started or finished; a running task is never interrupted.
    pub fn cancel_queued(&self, handle: &ResultHandle) -> bool {
        let mut queues = lock(&self.inner.queues);
        let Some(queue) = queues.get_mut(&handle.mesh) else {
            return false;
        };
        let before = queue.pending.len();
        queue.pending.retain(|task| task.task_id != handle.task_id);
        before != queue.pending.len()
    }

    /// Number of queued (not running) tasks for a mesh.
    pub fn pending_count(&self, mesh: MeshId) -> usize {
        lock(&self.inner.queues)
            .get(&mesh)
            .map(|queue| queue.pending.len())
            .unwrap_or(0)
    }
}

impl Inner {
    /// Start the next queued task for `mesh` if nothing is running there.
    fn dispatch_next(self: &Arc<Self>, mesh: MeshId) {
        let task = {
            let mut queues = lock(&self.queues);
            let Some(queue) = queues.get_mut(&mesh) else {
                return;
            };
            if queue.running.is_some() {
                return;
            }
            match queue.pending.pop_front() {
                Some(task) => {
                    queue.running = Some(task.task_id);
                    task
                }
                None => {
                    queues.remove(&mesh);
                    return;
                }
            }
        };

        let inner = Arc::clone(self);
        self.runtime.spawn_blocking(move || {
            let result = inner.execute(mesh, &task.request);
            // The submitter may have dropped its handle; the queue still
            // has to advance.
            let _ = task.tx.send(result);
            inner.finish(mesh, task.task_id);
        });
    }

    fn execute(&self, mesh: MeshId, request: &Request) -> TaskResult {
        match self.hooks.snapshots.fetch_snapshot(mesh) {
            Some(snapshot) => run_request(mesh, request, &snapshot, &self.hooks.pass_hooks()),
            None => {
                warn!(?mesh, "vertex snapshot unavailable, failing paint task");
                TaskResult::failed(TaskFailure::SnapshotUnavailable)
            }
        }
    }

    fn finish(self: &Arc<Self>, mesh: MeshId, task_id: u64) {
        {
            let mut queues = lock(&self.queues);
            if let Some(queue) = queues.get_mut(&mesh) {
                if queue.running == Some(task_id) {
                    queue.running = None;
                }
                if queue.is_idle() {
                    queues.remove(&mesh);
                }
            }
        }
        self.dispatch_next(mesh);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Condvar;
    use std::time::Duration;

    use glam::Vec3;
    use vertex_paint::{
        Channel, ChannelOp, ChannelOps, CollisionProbe, ComplexShapeRef, ConditionFallback,
        EntireMeshCoverage, FalloffSpec, MeshVertexSnapshot, PackedColor, PaintBrush,
        PaintCondition, ProbeError, RequestKind, SnapshotProvider, SnapshotVertex, VertexColor,
    };

    fn one_vertex_snapshot() -> MeshVertexSnapshot {
        MeshVertexSnapshot::new(vec![SnapshotVertex::new(
            Vec3::ZERO,
            Vec3::Z,
            VertexColor::TRANSPARENT,
        )])
    }

    struct FixedSnapshots {
        meshes: HashMap<MeshId, MeshVertexSnapshot>,
    }

    impl FixedSnapshots {
        fn single(mesh: MeshId) -> Self {
            let mut meshes = HashMap::new();
            meshes.insert(mesh, one_vertex_snapshot());
            Self { meshes }
        }
    }

    impl SnapshotProvider for FixedSnapshots {
        fn vertex_count(&self, mesh: MeshId) -> usize {
            self.meshes.get(&mesh).map(MeshVertexSnapshot::len).unwrap_or(0)
        }

        fn fetch_snapshot(&self, mesh: MeshId) -> Option<MeshVertexSnapshot> {
            self.meshes.get(&mesh).cloned()
        }
    }

    /// Reusable barrier: tasks block in `fetch_snapshot` until opened.
    struct Gate {
        open: Mutex<bool>,
        cv: Condvar,
    }

    impl Gate {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                open: Mutex::new(false),
                cv: Condvar::new(),
            })
        }

        fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.cv.notify_all();
        }

        fn wait_open(&self) {
            let mut open = self.open.lock().unwrap();
            while !*open {
                let (guard, timeout) = self
                    .cv
                    .wait_timeout(open, Duration::from_secs(5))
                    .unwrap();
                open = guard;
                assert!(!timeout.timed_out(), "gate never opened");
            }
        }
    }

    /// Snapshot provider whose fetches block on a gate, so tests can hold a
    /// task in the running state deterministically.
    struct GatedSnapshots {
        mesh: MeshId,
        gate: Arc<Gate>,
        started: Arc<Gate>,
    }

    impl SnapshotProvider for GatedSnapshots {
        fn vertex_count(&self, mesh: MeshId) -> usize {
            if mesh == self.mesh { 1 } else { 0 }
        }

        fn fetch_snapshot(&self, mesh: MeshId) -> Option<MeshVertexSnapshot> {
            self.started.open();
            self.gate.wait_open();
            (mesh == self.mesh).then(one_vertex_snapshot)
        }
    }

    /// Records every line-of-sight query as a (mesh tag, submission index)
    /// pair smuggled through `from`, which the FIFO tests use to observe
    /// execution order.
    struct RecordingProbe {
        seen: Mutex<Vec<(u32, u32)>>,
    }

    impl CollisionProbe for RecordingProbe {
        fn line_of_sight(
            &self,
            from: Vec3,
            _to: Vec3,
            _ignore: &[MeshId],
        ) -> Result<bool, ProbeError> {
            self.seen.lock().unwrap().push((from.y as u32, from.x as u32));
            Ok(true)
        }

        fn point_in_complex_shape(
            &self,
            _point: Vec3,
            _shape: ComplexShapeRef,
        ) -> Result<bool, ProbeError> {
            Ok(true)
        }
    }

    fn add_red() -> PaintBrush {
        PaintBrush::Channels(ChannelOps::single(Channel::Red, ChannelOp::add(0.1)))
    }

    /// Paint request tagged with a mesh tag and submission index observable
    /// through a recording probe.
    fn tagged_request(mesh_tag: u32, index: u32) -> Request {
        Request::paint(
            RequestKind::PaintAtLocation {
                location: Vec3::ZERO,
                radius: 1.0,
                falloff: FalloffSpec::flat(),
            },
            add_red(),
        )
        .with_conditions(vec![PaintCondition::LineOfSight {
            from: Vec3::new(index as f32, mesh_tag as f32, 0.0),
            ignore: Vec::new(),
            fallback: ConditionFallback::default(),
        }])
    }

    fn entire_mesh() -> Request {
        Request::paint(
            RequestKind::PaintEntireMesh {
                coverage: EntireMeshCoverage::default(),
                seed: Some(0),
            },
            add_red(),
        )
    }

    fn replace_buffer() -> Request {
        Request::paint(
            RequestKind::ApplyColorBuffer {
                colors: vec![
                    PackedColor {
                        r: 200,
                        g: 0,
                        b: 0,
                        a: 255,
                    };
                    1
                ],
            },
            PaintBrush::Channels(ChannelOps::default()),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_mesh_runs_in_submission_order() {
        let mesh = MeshId::new(0, 0);
        let probe = Arc::new(RecordingProbe {
            seen: Mutex::new(Vec::new()),
        });
        let hooks = EngineHooks::new(Arc::new(FixedSnapshots::single(mesh)))
            .with_collision(probe.clone());
        let scheduler = PaintScheduler::new(SchedulerConfig::default(), hooks, Handle::current());

        let mut handles = Vec::new();
        for index in 0..20 {
            handles.push(scheduler.submit(mesh, tagged_request(0, index)).unwrap());
        }
        for handle in handles {
            let result = handle.wait().await.expect("task completed");
            assert!(result.successful);
        }

        let seen = probe.seen.lock().unwrap();
        let order: Vec<u32> = seen.iter().map(|(_, index)| *index).collect();
        assert_eq!(order, (0..20).collect::<Vec<u32>>());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_per_mesh_order_holds_under_threaded_submission() {
        const MESHES: u32 = 4;
        const PER_MESH: u32 = 250;

        let mut meshes = HashMap::new();
        for tag in 0..MESHES {
            meshes.insert(MeshId::new(tag, 0), one_vertex_snapshot());
        }
        let probe = Arc::new(RecordingProbe {
            seen: Mutex::new(Vec::new()),
        });
        let hooks =
            EngineHooks::new(Arc::new(FixedSnapshots { meshes })).with_collision(probe.clone());
        let scheduler = PaintScheduler::new(SchedulerConfig::default(), hooks, Handle::current());

        let submitters: Vec<_> = (0..MESHES)
            .map(|tag| {
                let scheduler = scheduler.clone();
                std::thread::spawn(move || {
                    let mesh = MeshId::new(tag, 0);
                    let mut handles = Vec::new();
                    for index in 0..PER_MESH {
                        let mut request = tagged_request(tag, index);
                        request.options.bypass_queue_limit = true;
                        handles.push(scheduler.submit(mesh, request).unwrap());
                    }
                    handles
                })
            })
            .collect();

        let mut handles = Vec::new();
        for submitter in submitters {
            handles.extend(submitter.join().unwrap());
        }
        for handle in handles {
            assert!(handle.wait().await.expect("task completed").successful);
        }

        let seen = probe.seen.lock().unwrap();
        assert_eq!(seen.len(), (MESHES * PER_MESH) as usize);
        for tag in 0..MESHES {
            let order: Vec<u32> = seen
                .iter()
                .filter(|(mesh, _)| *mesh == tag)
                .map(|(_, index)| *index)
                .collect();
            assert_eq!(order, (0..PER_MESH).collect::<Vec<u32>>());
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_other_meshes_not_blocked_by_busy_mesh() {
        let busy = MeshId::new(0, 0);
        let free = MeshId::new(1, 0);
        let gate = Gate::new();
        let started = Gate::new();

        let mut meshes = HashMap::new();
        meshes.insert(free, one_vertex_snapshot());
        struct Split {
            busy: MeshId,
            gated: GatedSnapshots,
            rest: FixedSnapshots,
        }
        impl SnapshotProvider for Split {
            fn vertex_count(&self, mesh: MeshId) -> usize {
                if mesh == self.busy {
                    self.gated.vertex_count(mesh)
                } else {
                    self.rest.vertex_count(mesh)
                }
            }
            fn fetch_snapshot(&self, mesh: MeshId) -> Option<MeshVertexSnapshot> {
                if mesh == self.busy {
                    self.gated.fetch_snapshot(mesh)
                } else {
                    self.rest.fetch_snapshot(mesh)
                }
            }
        }
        let provider = Split {
            busy,
            gated: GatedSnapshots {
                mesh: busy,
                gate: gate.clone(),
                started: started.clone(),
            },
            rest: FixedSnapshots { meshes },
        };

        let scheduler = PaintScheduler::new(
            SchedulerConfig::default(),
            EngineHooks::new(Arc::new(provider)),
            Handle::current(),
        );

        let blocked = scheduler.submit(busy, entire_mesh()).unwrap();
        started.wait_open();

        // The busy mesh is mid-execution; the free mesh must still complete.
        let free_result = scheduler
            .submit(free, entire_mesh())
            .unwrap()
            .wait()
            .await
            .expect("free mesh task completed");
        assert!(free_result.successful);

        gate.open();
        assert!(blocked.wait().await.expect("busy mesh task completed").successful);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_overflow_rejected_and_bypassed() {
        let mesh = MeshId::new(0, 0);
        let gate = Gate::new();
        let started = Gate::new();
        let hooks = EngineHooks::new(Arc::new(GatedSnapshots {
            mesh,
            gate: gate.clone(),
            started: started.clone(),
        }));
        let scheduler = PaintScheduler::new(
            SchedulerConfig {
                max_pending_per_mesh: 2,
            },
            hooks,
            Handle::current(),
        );

        // First task starts running; the next two fill the queue.
        let mut handles = vec![scheduler.submit(mesh, entire_mesh()).unwrap()];
        started.wait_open();
        handles.push(scheduler.submit(mesh, entire_mesh()).unwrap());
        handles.push(scheduler.submit(mesh, entire_mesh()).unwrap());
        assert_eq!(scheduler.pending_count(mesh), 2);

        let rejected = scheduler.submit(mesh, entire_mesh());
        assert!(matches!(
            rejected,
            Err(SubmitError::QueueOverflow { pending: 2, .. })
        ));

        let mut bypassing = entire_mesh();
        bypassing.options.bypass_queue_limit = true;
        handles.push(scheduler.submit(mesh, bypassing).unwrap());

        gate.open();
        for handle in handles {
            assert!(handle.wait().await.expect("task completed").successful);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_full_replacement_supersedes_queued() {
        let mesh = MeshId::new(0, 0);
        let gate = Gate::new();
        let started = Gate::new();
        let hooks = EngineHooks::new(Arc::new(GatedSnapshots {
            mesh,
            gate: gate.clone(),
            started: started.clone(),
        }));
        let scheduler =
            PaintScheduler::new(SchedulerConfig::default(), hooks, Handle::current());

        let running = scheduler.submit(mesh, entire_mesh()).unwrap();
        started.wait_open();
        let queued = scheduler.submit(mesh, entire_mesh()).unwrap();
        let replacement = scheduler.submit(mesh, replace_buffer()).unwrap();

        let superseded = queued.wait().await.expect("superseded result delivered");
        assert!(!superseded.successful);
        assert_eq!(superseded.failure, Some(TaskFailure::Superseded));

        gate.open();
        assert!(running.wait().await.expect("running task completed").successful);
        let replaced = replacement.wait().await.expect("replacement completed");
        assert!(replaced.successful);
        assert_eq!(replaced.colors.as_deref().map(|c| c[0].r), Some(200));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_queued_task() {
        let mesh = MeshId::new(0, 0);
        let gate = Gate::new();
        let started = Gate::new();
        let hooks = EngineHooks::new(Arc::new(GatedSnapshots {
            mesh,
            gate: gate.clone(),
            started: started.clone(),
        }));
        let scheduler =
            PaintScheduler::new(SchedulerConfig::default(), hooks, Handle::current());

        let running = scheduler.submit(mesh, entire_mesh()).unwrap();
        started.wait_open();
        let queued = scheduler.submit(mesh, entire_mesh()).unwrap();

        // The running task can no longer be cancelled, the queued one can.
        assert!(!scheduler.cancel_queued(&running));
        assert!(scheduler.cancel_queued(&queued));
        assert_eq!(scheduler.pending_count(mesh), 0);

        gate.open();
        assert!(running.wait().await.expect("running task completed").successful);
        assert!(queued.wait().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_request_rejected_synchronously() {
        let known = MeshId::new(0, 0);
        let unknown = MeshId::new(9, 0);
        let hooks = EngineHooks::new(Arc::new(FixedSnapshots::single(known)));
        let scheduler =
            PaintScheduler::new(SchedulerConfig::default(), hooks, Handle::current());

        assert!(matches!(
            scheduler.submit(unknown, entire_mesh()),
            Err(SubmitError::Invalid(_))
        ));
        assert_eq!(scheduler.pending_count(unknown), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_task_does_not_wedge_queue() {
        let mesh = MeshId::new(0, 0);

        // Validation sees vertices, execution finds the mesh gone.
        struct Vanishing;
        impl SnapshotProvider for Vanishing {
            fn vertex_count(&self, _mesh: MeshId) -> usize {
                1
            }
            fn fetch_snapshot(&self, _mesh: MeshId) -> Option<MeshVertexSnapshot> {
                None
            }
        }

        let scheduler = PaintScheduler::new(
            SchedulerConfig::default(),
            EngineHooks::new(Arc::new(Vanishing)),
            Handle::current(),
        );

        let first = scheduler.submit(mesh, entire_mesh()).unwrap();
        let second = scheduler.submit(mesh, entire_mesh()).unwrap();

        let first = first.wait().await.expect("first result delivered");
        assert_eq!(first.failure, Some(TaskFailure::SnapshotUnavailable));
        let second = second.wait().await.expect("second result delivered");
        assert_eq!(second.failure, Some(TaskFailure::SnapshotUnavailable));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_on_complete_callback() {
        let mesh = MeshId::new(0, 0);
        let hooks = EngineHooks::new(Arc::new(FixedSnapshots::single(mesh)));
        let scheduler =
            PaintScheduler::new(SchedulerConfig::default(), hooks, Handle::current());

        let (tx, rx) = oneshot::channel();
        scheduler
            .submit(mesh, entire_mesh())
            .unwrap()
            .on_complete(move |result| {
                let _ = tx.send(result.successful);
            });
        assert!(rx.await.expect("callback ran"));
    }
}
