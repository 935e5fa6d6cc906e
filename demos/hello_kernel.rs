use groupsync_rs::kernels;
use groupsync_rs::prelude::*;

fn main() -> Result<()> {
    let ctx = ExecutionContext::with_defaults()?;

    println!("=== Hello Kernel ===\n");
    ctx.launch(kernels::hello(3, 5), IndexSpace::d1(6)?, 4)?;

    println!("\n=== Twice ===\n");
    let mut buf = ctx.allocate::<i32>(6)?;
    buf.upload(&[1, 2, 3, 4, 5, 6])?;
    println!("before: {:?}", buf.host());

    ctx.launch(kernels::twice(buf.view()), IndexSpace::d1(6)?, 6)?;
    ctx.synchronize()?;

    println!("after:  {:?}", buf.download());

    let mut copy = [0i32; 6];
    buf.copy_to_host(&mut copy)?;
    println!("copied: {:?}", copy);

    println!("\n=== Example Complete ===");
    Ok(())
}
