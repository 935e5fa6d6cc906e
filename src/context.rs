use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::dispatch::DispatchEnv;
use crate::executor::{CpuPool, PanicHandler, PoolStats};
use crate::index::{Extent, IndexSpace};
use crate::kernel::Kernel;
use crate::launch::{DeferredErrors, LaunchHandle, LaunchReport, LaunchRequest};
use crate::memory::{Buffer, DeviceAllocator, Element};
use crate::profiling::ProfilingMarker;
use crate::stream::{Command, Stream};
use crate::sync::{CancelToken, Completion};
use crate::telemetry::{Metrics, MetricsSnapshot};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Owns the worker pool, device memory budget and command stream that
/// kernels are launched on.
///
/// ```no_run
/// use groupsync_rs::prelude::*;
///
/// let ctx = ExecutionContext::with_defaults()?;
/// let mut buf = ctx.allocate::<i32>(6)?;
/// buf.upload(&[1, 2, 3, 4, 5, 6])?;
///
/// let view = buf.view();
/// let twice = KernelFn::new("twice", move |item| view.update(item.index(), |v| v * 2));
/// ctx.launch(twice, IndexSpace::from_extent(buf.extent())?, 6)?;
/// ctx.synchronize()?;
///
/// assert_eq!(buf.download(), vec![2, 4, 6, 8, 10, 12]);
/// # Ok::<(), groupsync_rs::Error>(())
/// ```
pub struct ExecutionContext {
    // dropped first: drains queued commands while the pool is still alive
    stream: Stream,
    id: u64,
    config: Config,
    pool: Arc<CpuPool>,
    allocator: DeviceAllocator,
    deferred: DeferredErrors,
    next_launch: AtomicU64,
    next_marker: AtomicU64,
    metrics: Arc<Metrics>,
}

impl ExecutionContext {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let pool = Arc::new(CpuPool::new(&config)?);
        let metrics = Arc::new(Metrics::new());
        let deferred: DeferredErrors = Arc::new(Mutex::new(BTreeMap::new()));

        let env = DispatchEnv {
            pool: pool.clone(),
            panics: Arc::new(PanicHandler::new(config.panic_strategy)),
            config: config.clone(),
        };
        let stream = Stream::start(env, deferred.clone(), metrics.clone())?;

        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            context = id,
            threads = pool.num_threads(),
            strategy = ?config.strategy,
            max_group_size = config.max_group_size,
            "execution context created"
        );

        Ok(Self {
            stream,
            id,
            allocator: DeviceAllocator::new(config.memory_capacity),
            config,
            pool,
            deferred,
            next_launch: AtomicU64::new(1),
            next_marker: AtomicU64::new(0),
            metrics,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(Config::default())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }

    pub fn allocator(&self) -> &DeviceAllocator {
        &self.allocator
    }

    /// A zero-initialized 1D buffer of `len` elements.
    pub fn allocate<T: Element>(&self, len: usize) -> Result<Buffer<T>> {
        self.allocate_extent(Extent::D1(len))
    }

    /// A zero-initialized `width x height` buffer, row-major.
    pub fn allocate_2d<T: Element>(&self, width: usize, height: usize) -> Result<Buffer<T>> {
        if width == 0 || height == 0 {
            return Err(Error::allocation(format!(
                "2D buffer {}x{} has a zero dimension",
                width, height
            )));
        }
        if width.checked_mul(height).is_none() {
            return Err(Error::allocation(format!(
                "2D buffer {}x{} overflows usize",
                width, height
            )));
        }
        self.allocate_extent(Extent::D2 { width, height })
    }

    pub fn allocate_extent<T: Element>(&self, extent: Extent) -> Result<Buffer<T>> {
        let lease = self
            .allocator
            .reserve(extent.len(), std::mem::size_of::<T>())?;
        self.metrics.record_allocation(lease.bytes());
        tracing::debug!(
            context = self.id,
            extent = %extent,
            bytes = lease.bytes(),
            in_use = self.allocator.used(),
            "buffer allocated"
        );
        Ok(Buffer::new(extent, lease))
    }

    /// Run `kernel` once per index of `space`, in groups of at most
    /// `group_size`, and wait for every work-item to finish.
    pub fn launch<K: Kernel>(&self, kernel: K, space: IndexSpace, group_size: usize) -> Result<LaunchReport> {
        self.launch_async(kernel, space, group_size)?.wait()
    }

    /// Queue a launch behind everything already on the stream.
    pub fn launch_async<K: Kernel>(
        &self,
        kernel: K,
        space: IndexSpace,
        group_size: usize,
    ) -> Result<LaunchHandle> {
        if group_size == 0 {
            return Err(Error::config("group_size must be > 0"));
        }
        if group_size > self.config.max_group_size {
            return Err(Error::config(format!(
                "group_size {} exceeds max_group_size {}",
                group_size, self.config.max_group_size
            )));
        }

        let id = self.next_launch.fetch_add(1, Ordering::Relaxed);
        let kernel: Arc<dyn Kernel> = Arc::new(kernel);
        let name = kernel.name().to_string();
        let cancel = CancelToken::new();
        let completion = Arc::new(Completion::new());

        self.stream.send(Command::Launch(LaunchRequest {
            id,
            kernel,
            space,
            group_size,
            cancel: cancel.clone(),
            completion: completion.clone(),
        }))?;

        Ok(LaunchHandle {
            id,
            kernel: name,
            cancel,
            completion,
            deferred: self.deferred.clone(),
        })
    }

    /// Wait for everything queued so far. Reports the first failure among
    /// launches whose handles were never waited on.
    pub fn synchronize(&self) -> Result<()> {
        let done = Arc::new(Completion::new());
        self.stream.send(Command::Fence(done.clone()))?;
        done.wait();

        let mut deferred = self.deferred.lock();
        let first = deferred.values().next().cloned();
        deferred.clear();
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Queue a profiling marker behind everything already on the stream.
    pub fn mark(&self) -> Result<ProfilingMarker> {
        if !self.config.enable_profiling {
            return Err(Error::profiling("profiling is disabled for this context"));
        }

        let marker = ProfilingMarker {
            context: self.id,
            seq: self.next_marker.fetch_add(1, Ordering::Relaxed),
            recorded: Arc::new(Completion::new()),
        };
        self.stream.send(Command::Mark(marker.recorded.clone()))?;
        tracing::trace!(context = self.id, marker = marker.seq, "marker queued");
        Ok(marker)
    }

    pub fn elapsed(&self, start: &ProfilingMarker, end: &ProfilingMarker) -> Result<Duration> {
        if start.context != self.id {
            return Err(Error::profiling("start marker belongs to another context"));
        }
        end.elapsed_since(start)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("threads", &self.pool.num_threads())
            .field("strategy", &self.config.strategy)
            .field("memory_in_use", &self.allocator.used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionStrategy;
    use crate::kernel::KernelFn;

    fn context() -> ExecutionContext {
        let config = Config::builder().num_threads(2).build().unwrap();
        ExecutionContext::new(config).unwrap()
    }

    #[test]
    fn test_custom_config() {
        let ctx = context();
        assert_eq!(ctx.num_threads(), 2);
        assert_eq!(ctx.config().max_group_size, 256);
    }

    #[test]
    fn test_allocation_errors() {
        let config = Config::builder().memory_capacity(64).build().unwrap();
        let ctx = ExecutionContext::new(config).unwrap();

        assert!(matches!(ctx.allocate::<i32>(0), Err(Error::Allocation(_))));
        assert!(matches!(ctx.allocate_2d::<u8>(0, 3), Err(Error::Allocation(_))));

        let held = ctx.allocate::<u64>(8).unwrap();
        assert_eq!(ctx.allocator().used(), 64);
        assert!(matches!(ctx.allocate::<u8>(1), Err(Error::Allocation(_))));

        drop(held);
        assert!(ctx.allocate::<u8>(1).is_ok());
    }

    #[test]
    fn test_group_size_validation() {
        let ctx = context();
        let space = IndexSpace::d1(4).unwrap();
        let noop = || KernelFn::new("noop", |_item| Ok(()));

        assert!(matches!(ctx.launch(noop(), space, 0), Err(Error::Config(_))));
        assert!(matches!(ctx.launch(noop(), space, 257), Err(Error::Config(_))));
        assert!(ctx.launch(noop(), space, 4).is_ok());
    }

    #[test]
    fn test_launch_report() {
        let ctx = context();
        let buf = ctx.allocate::<usize>(10).unwrap();
        let view = buf.view();
        let kernel = KernelFn::new("store_index", move |item| view.set(item.index(), item.index()));

        let report = ctx.launch(kernel, IndexSpace::d1(10).unwrap(), 4).unwrap();
        assert_eq!(report.kernel, "store_index");
        assert_eq!(report.groups, 3);
        assert_eq!(report.work_items, 10);
        assert_eq!(report.barrier_phases, 0);

        let metrics = ctx.metrics();
        #[cfg(feature = "telemetry")]
        assert_eq!(metrics.launches_completed, 1);
        let _ = metrics;
    }

    #[test]
    fn test_sequential_strategy() {
        let config = Config::builder()
            .strategy(ExecutionStrategy::Sequential)
            .build()
            .unwrap();
        let ctx = ExecutionContext::new(config).unwrap();
        let mut buf = ctx.allocate::<u32>(5).unwrap();
        let view = buf.view();
        let kernel = KernelFn::new("fill", move |item| view.set(item.index(), 7));

        ctx.launch(kernel, IndexSpace::d1(5).unwrap(), 2).unwrap();
        assert_eq!(buf.download(), vec![7; 5]);
    }

    #[test]
    fn test_isolated_panics_still_fault() {
        use crate::executor::PanicStrategy;

        let config = Config::builder()
            .num_threads(2)
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();
        let ctx = ExecutionContext::new(config).unwrap();
        let kernel = KernelFn::new("panics", |item| {
            if item.index() == 1 {
                panic!("bad work-item");
            }
            Ok(())
        });

        let err = ctx.launch(kernel, IndexSpace::d1(2).unwrap(), 2).unwrap_err();
        assert!(matches!(err, Error::KernelFault { index: Some(1), .. }), "got {:?}", err);
    }

    #[test]
    fn test_profiling_disabled() {
        let config = Config::builder().enable_profiling(false).build().unwrap();
        let ctx = ExecutionContext::new(config).unwrap();
        assert!(matches!(ctx.mark(), Err(Error::Profiling(_))));
    }
}
