use groupsync_rs::kernels::{device_sum, divergent_tree_sum_kernel};
use groupsync_rs::prelude::*;

fn main() -> Result<()> {
    let ctx = ExecutionContext::with_defaults()?;
    let size = ctx.config().max_group_size;
    let data: Vec<i64> = (1..=size as i64).collect();

    println!("=== Tree Reduction ({} elements) ===\n", size);
    let report = device_sum(&ctx, &data, size)?;
    println!("result: {}", report.result);
    println!("groups: {} of {}", report.groups, report.group_size);
    println!("steps:  {}", report.steps);
    println!("time:   {:?}", report.device_time);

    println!("\n=== Barrier Inside The Branch ===\n");
    let mut buf = ctx.allocate::<i64>(size)?;
    buf.upload(&data)?;
    match ctx.launch(
        divergent_tree_sum_kernel(buf.view(), size),
        IndexSpace::d1(size)?,
        size,
    ) {
        Ok(_) => println!("unexpectedly finished, buffer[0] = {}", buf.download()[0]),
        Err(err) => println!("flagged: {}", err),
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
