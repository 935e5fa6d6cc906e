//! Barrier hazards: divergence, faults under a barrier, timeouts and
//! cancellation.

use groupsync_rs::kernels::{divergent_tree_sum_kernel, tree_sum_kernel};
use groupsync_rs::prelude::*;
use std::time::{Duration, Instant};

fn context_with_timeout(timeout: Duration) -> ExecutionContext {
    let config = Config::builder()
        .num_threads(2)
        .barrier_timeout(timeout)
        .build()
        .unwrap();
    ExecutionContext::new(config).unwrap()
}

#[test]
fn test_divergent_sum_is_flagged() {
    let ctx = context_with_timeout(Duration::from_secs(5));

    for size in [2usize, 4, 6, 8, 64] {
        let data: Vec<i64> = (1..=size as i64).collect();
        let mut buf = ctx.allocate::<i64>(size).unwrap();
        buf.upload(&data).unwrap();

        let result = ctx.launch(
            divergent_tree_sum_kernel(buf.view(), size),
            IndexSpace::d1(size).unwrap(),
            size,
        );

        // never silently accepted: either the barrier trips or the sum is wrong
        match result {
            Err(err) => assert!(err.is_barrier_error(), "size {}: {:?}", size, err),
            Ok(_) => assert_ne!(buf.download()[0], data.iter().sum::<i64>()),
        }
    }
}

#[test]
fn test_divergence_reports_mismatch_details() {
    let ctx = context_with_timeout(Duration::from_secs(5));
    let mut buf = ctx.allocate::<i64>(4).unwrap();
    buf.upload(&[1, 2, 3, 4]).unwrap();

    let err = ctx
        .launch(
            divergent_tree_sum_kernel(buf.view(), 4),
            IndexSpace::d1(4).unwrap(),
            4,
        )
        .unwrap_err();

    match err {
        Error::BarrierMismatch {
            group,
            index,
            arrivals,
            expected,
        } => {
            assert_eq!(group, 0);
            assert!(index < 4);
            assert_ne!(arrivals, expected);
        }
        other => panic!("expected a barrier mismatch, got {:?}", other),
    }
}

#[test]
fn test_correct_sum_passes_same_setup() {
    let ctx = context_with_timeout(Duration::from_secs(5));
    let mut buf = ctx.allocate::<i64>(8).unwrap();
    buf.upload(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

    let report = ctx
        .launch(tree_sum_kernel(buf.view(), 8), IndexSpace::d1(8).unwrap(), 8)
        .unwrap();

    assert_eq!(report.barrier_phases, 3);
    assert_eq!(buf.download()[0], 36);
}

#[test]
fn test_conditional_barrier_on_one_item() {
    let ctx = context_with_timeout(Duration::from_secs(5));

    let kernel = KernelFn::new("skip_one", |item| {
        if item.local_index() != 2 {
            item.barrier()?;
        }
        Ok(())
    });

    let err = ctx.launch(kernel, IndexSpace::d1(4).unwrap(), 4).unwrap_err();
    assert!(matches!(err, Error::BarrierMismatch { group: 0, .. }), "got {:?}", err);
}

#[test]
fn test_fault_under_barrier_names_faulting_item() {
    let ctx = context_with_timeout(Duration::from_secs(5));

    let kernel = KernelFn::new("fault_then_barrier", |item| {
        if item.index() == 5 {
            return Err(Error::fault(None, "bad input"));
        }
        item.barrier()?;
        Ok(())
    });

    let err = ctx.launch(kernel, IndexSpace::d1(8).unwrap(), 4).unwrap_err();
    assert!(
        matches!(err, Error::KernelFault { index: Some(5), .. }),
        "got {:?}",
        err
    );
}

#[test]
fn test_barrier_timeout() {
    let ctx = context_with_timeout(Duration::from_millis(50));

    let kernel = KernelFn::new("late_arrival", |item| {
        if item.local_index() == 0 {
            std::thread::sleep(Duration::from_millis(300));
        }
        item.barrier()
    });

    let start = Instant::now();
    let err = ctx.launch(kernel, IndexSpace::d1(3).unwrap(), 3).unwrap_err();
    assert!(matches!(err, Error::Timeout { group: 0, .. }), "got {:?}", err);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_cancel_between_phases() {
    let ctx = context_with_timeout(Duration::from_secs(5));

    let kernel = KernelFn::new("many_phases", |item| {
        for _ in 0..10_000 {
            std::thread::sleep(Duration::from_micros(200));
            item.barrier()?;
        }
        Ok(())
    });

    let handle = ctx
        .launch_async(kernel, IndexSpace::d1(16).unwrap(), 4)
        .unwrap();
    std::thread::sleep(Duration::from_millis(20));
    handle.cancel();

    assert_eq!(handle.wait().unwrap_err(), Error::Cancelled);

    // the error was consumed by wait
    ctx.synchronize().unwrap();
}

#[test]
fn test_unwaited_failure_surfaces_at_synchronize() {
    let ctx = context_with_timeout(Duration::from_secs(5));

    let failing = KernelFn::new("fails", |item| {
        if item.index() == 1 {
            return Err(Error::fault(None, "boom"));
        }
        Ok(())
    });
    drop(ctx.launch_async(failing, IndexSpace::d1(4).unwrap(), 2).unwrap());

    let err = ctx.synchronize().unwrap_err();
    assert!(matches!(err, Error::KernelFault { index: Some(1), .. }));

    // reported once
    ctx.synchronize().unwrap();
}
