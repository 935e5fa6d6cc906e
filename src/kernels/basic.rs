//! Small element-wise kernels.

use crate::kernel::{Kernel, KernelFn, WorkItem};
use crate::memory::ArrayView;

/// Prints one greeting per work-item to stdout.
pub fn hello(a: i32, b: i32) -> impl Kernel {
    KernelFn::new("hello", move |item: &WorkItem| {
        println!("{}", hello_line(item, a, b));
        tracing::trace!(index = item.index(), group = item.group_index(), "hello printed");
        Ok(())
    })
}

fn hello_line(item: &WorkItem, a: i32, b: i32) -> String {
    format!(
        "Hello from work-item {} (group {}, local {}): {} + {} = {}",
        item.index(),
        item.group_index(),
        item.local_index(),
        a,
        b,
        a.wrapping_add(b)
    )
}

/// `data[i] *= 2`.
pub fn twice(data: ArrayView<i32>) -> impl Kernel {
    KernelFn::new("twice", move |item: &WorkItem| {
        data.update(item.index(), |v| v.wrapping_mul(2))
    })
}

/// Each work-item sums `0..iterations` and stores the total at its index.
pub fn busy_loop(iterations: u64, out: ArrayView<u64>) -> impl Kernel {
    KernelFn::new("busy_loop", move |item: &WorkItem| {
        out.set(item.index(), host_busy_loop(iterations))
    })
}

/// The same loop run directly on the calling thread.
pub fn host_busy_loop(iterations: u64) -> u64 {
    let mut acc: u64 = 0;
    for i in 0..iterations {
        acc = acc.wrapping_add(std::hint::black_box(i));
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::ExecutionContext;
    use crate::error::Result;
    use crate::index::IndexSpace;

    fn context() -> ExecutionContext {
        ExecutionContext::new(Config::builder().num_threads(2).build().unwrap()).unwrap()
    }

    #[test]
    fn test_twice() -> Result<()> {
        let ctx = context();
        let mut buf = ctx.allocate::<i32>(6)?;
        buf.upload(&[1, 2, 3, 4, 5, 6])?;

        ctx.launch(twice(buf.view()), IndexSpace::d1(6)?, 6)?;
        ctx.synchronize()?;

        assert_eq!(buf.download(), vec![2, 4, 6, 8, 10, 12]);
        Ok(())
    }

    #[test]
    fn test_busy_loop_matches_host() -> Result<()> {
        let ctx = context();
        let mut buf = ctx.allocate::<u64>(4)?;
        ctx.launch(busy_loop(1_000, buf.view()), IndexSpace::d1(4)?, 2)?;

        assert_eq!(host_busy_loop(1_000), 499_500);
        assert_eq!(buf.download(), vec![499_500; 4]);
        Ok(())
    }

    #[test]
    fn test_hello_runs_every_item() -> Result<()> {
        let ctx = context();
        let report = ctx.launch(hello(3, 5), IndexSpace::d1(6)?, 4)?;
        assert_eq!(report.work_items, 6);
        assert_eq!(report.groups, 2);
        Ok(())
    }

    #[test]
    fn test_hello_line() -> Result<()> {
        let ctx = context();
        let lines = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = lines.clone();
        let kernel = KernelFn::new("hello_lines", move |item: &WorkItem| {
            sink.lock().push(hello_line(item, 3, 5));
            Ok(())
        });
        ctx.launch(kernel, IndexSpace::d1(6)?, 4)?;

        let lines = lines.lock();
        assert_eq!(lines.len(), 6);
        assert!(lines.contains(&"Hello from work-item 5 (group 1, local 1): 3 + 5 = 8".to_string()));
        Ok(())
    }
}
