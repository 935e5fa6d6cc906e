use groupsync_rs::kernels::{busy_loop, compare_with_host, host_busy_loop};
use groupsync_rs::prelude::*;
use rand::Rng;

fn main() -> Result<()> {
    let ctx = ExecutionContext::with_defaults()?;

    println!("=== Busy Loop ===\n");
    let iterations = rand::thread_rng().gen_range(10_000..100_000u64);
    println!("iterations: {}", iterations);

    let mut out = ctx.allocate::<u64>(1)?;
    let start = ctx.mark()?;
    ctx.launch_async(busy_loop(iterations, out.view()), IndexSpace::d1(1)?, 1)?;
    let end = ctx.mark()?;
    ctx.synchronize()?;
    println!("device time: {:?} (result {})", ctx.elapsed(&start, &end)?, out.download()[0]);

    let (host, took) = HostStopwatch::time(|| host_busy_loop(iterations));
    println!("host time:   {:?} (result {})", took, host);

    println!("\n=== Sum of 1..=256 ===\n");
    let data: Vec<i64> = (1..=256).collect();
    let comparison = compare_with_host(&ctx, &data, 256)?;
    println!("{}", comparison);

    let metrics = ctx.metrics();
    println!(
        "\nlaunches: {}, work-items: {}, barrier phases: {}",
        metrics.launches_completed, metrics.work_items_executed, metrics.barrier_phases
    );

    println!("\n=== Example Complete ===");
    Ok(())
}
