use groupsync_rs::kernels::{device_sum, host_sum, twice};
use groupsync_rs::prelude::*;
use std::time::Duration;

fn context() -> ExecutionContext {
    ExecutionContext::new(Config::builder().num_threads(4).build().unwrap()).unwrap()
}

#[test]
fn test_context_creation() {
    assert!(ExecutionContext::with_defaults().is_ok());
}

#[test]
fn test_upload_download_without_launch() {
    let ctx = context();
    let mut buf = ctx.allocate::<i32>(6).unwrap();
    buf.upload(&[1, 2, 3, 4, 5, 6]).unwrap();

    assert_eq!(buf.download(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_upload_length_mismatch() {
    let ctx = context();
    let mut buf = ctx.allocate::<i32>(4).unwrap();

    assert!(matches!(buf.upload(&[1, 2, 3]), Err(Error::IndexSpace(_))));
}

#[test]
fn test_copy_to_host_into_existing_slice() {
    let ctx = context();
    let mut buf = ctx.allocate::<i32>(6).unwrap();
    buf.upload(&[1, 2, 3, 4, 5, 6]).unwrap();

    ctx.launch(twice(buf.view()), IndexSpace::d1(6).unwrap(), 6)
        .unwrap();

    let mut host = [0i32; 6];
    buf.copy_to_host(&mut host).unwrap();
    assert_eq!(host, [2, 4, 6, 8, 10, 12]);

    let mut short = [0i32; 5];
    assert!(buf.copy_to_host(&mut short).is_err());
}

#[test]
fn test_sum_one_to_six() {
    let ctx = context();
    let report = device_sum(&ctx, &[1, 2, 3, 4, 5, 6], 8).unwrap();

    assert_eq!(report.result, 21);
    assert_eq!(report.result, host_sum(&[1, 2, 3, 4, 5, 6]).result);
}

#[test]
fn test_sum_non_power_of_two_groups() {
    let ctx = context();

    for len in [3usize, 5, 7, 100, 257, 1000] {
        let data: Vec<i64> = (1..=len as i64).collect();
        let expected = (len * (len + 1) / 2) as i64;

        for group in [3usize, 6, 7, 64] {
            let report = device_sum(&ctx, &data, group).unwrap();
            assert_eq!(report.result, expected, "len {} group {}", len, group);
            assert!(report.launch.barrier_phases <= report.steps);
        }
    }
}

#[test]
fn test_sum_multiple_groups() {
    let ctx = context();
    let data: Vec<i64> = (0..1024).collect();
    let report = device_sum(&ctx, &data, 256).unwrap();

    assert_eq!(report.groups, 4);
    assert_eq!(report.partials.len(), 4);
    assert_eq!(report.result, 1024 * 1023 / 2);
}

#[test]
fn test_sequential_strategy_same_result() {
    let config = Config::builder()
        .strategy(ExecutionStrategy::Sequential)
        .build()
        .unwrap();
    let ctx = ExecutionContext::new(config).unwrap();
    let data: Vec<i64> = (1..=50).collect();

    assert_eq!(device_sum(&ctx, &data, 16).unwrap().result, 1275);
}

#[test]
fn test_async_launches_run_in_order() {
    let ctx = context();
    let mut buf = ctx.allocate::<i32>(8).unwrap();
    buf.upload(&[1; 8]).unwrap();

    let first = ctx
        .launch_async(twice(buf.view()), IndexSpace::d1(8).unwrap(), 4)
        .unwrap();
    let second = ctx
        .launch_async(twice(buf.view()), IndexSpace::d1(8).unwrap(), 4)
        .unwrap();
    assert!(first.id() < second.id());

    ctx.synchronize().unwrap();
    assert!(first.is_complete() && second.is_complete());
    assert_eq!(buf.download(), vec![4; 8]);
}

#[test]
fn test_wait_timeout_on_slow_launch() {
    let ctx = context();
    let slow = KernelFn::new("slow", |_item| {
        std::thread::sleep(Duration::from_millis(200));
        Ok(())
    });
    let handle = ctx
        .launch_async(slow, IndexSpace::d1(2).unwrap(), 2)
        .unwrap();

    assert!(handle.wait_timeout(Duration::from_millis(1)).is_none());
    let report = handle
        .wait_timeout(Duration::from_secs(10))
        .expect("launch should finish")
        .unwrap();
    assert_eq!(report.work_items, 2);
}

#[test]
fn test_wait_timeout_claims_failure() {
    let ctx = context();
    let failing = KernelFn::new("fails", |_item| Err(Error::fault(None, "boom")));
    let handle = ctx
        .launch_async(failing, IndexSpace::d1(2).unwrap(), 2)
        .unwrap();

    let outcome = handle.wait_timeout(Duration::from_secs(10)).unwrap();
    assert!(matches!(outcome, Err(Error::KernelFault { .. })));
    // already reported to the handle
    ctx.synchronize().unwrap();
}

#[test]
fn test_kernel_fault_reports_index() {
    let ctx = context();
    let buf = ctx.allocate::<i32>(4).unwrap();
    let view = buf.view();

    // reads one past the end on the last item
    let kernel = KernelFn::new("off_by_one", move |item| {
        let next = view.get(item.index() + 1)?;
        view.set(item.index(), next)
    });

    let err = ctx.launch(kernel, IndexSpace::d1(4).unwrap(), 4).unwrap_err();
    assert!(
        matches!(err, Error::KernelFault { index: Some(3), .. }),
        "got {:?}",
        err
    );
}

#[test]
fn test_kernel_panic_becomes_fault() {
    let ctx = context();
    let kernel = KernelFn::new("panicky", |item| {
        let data = [0u8; 2];
        std::hint::black_box(data[item.index()]);
        Ok(())
    });

    let err = ctx.launch(kernel, IndexSpace::d1(3).unwrap(), 3).unwrap_err();
    assert!(matches!(err, Error::KernelFault { index: Some(2), .. }));

    // the context stays usable
    let ok = KernelFn::new("noop", |_item| Ok(()));
    assert!(ctx.launch(ok, IndexSpace::d1(3).unwrap(), 3).is_ok());
}

#[test]
fn test_mismatched_extents() {
    assert!(matches!(
        IndexSpace::matching(&[Extent::D1(4), Extent::D1(5)]),
        Err(Error::IndexSpace(_))
    ));
    assert!(matches!(IndexSpace::d1(0), Err(Error::IndexSpace(_))));
}

#[test]
fn test_view_after_buffer_dropped() {
    let ctx = context();
    let buf = ctx.allocate::<i32>(4).unwrap();
    let view = buf.view();
    drop(buf);

    assert!(matches!(view.get(0), Err(Error::KernelFault { .. })));
    assert_eq!(ctx.allocator().used(), 0);
}
