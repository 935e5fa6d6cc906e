//! Runs the image kernels over a generated gradient and prints a few pixels.
//! Reading and writing image files is left to a codec crate.

use groupsync_rs::kernels::{invert_gray, invert_rgb, radial_project, Rgb};
use groupsync_rs::prelude::*;

const WIDTH: usize = 64;
const HEIGHT: usize = 48;

fn main() -> Result<()> {
    let ctx = ExecutionContext::with_defaults()?;
    let space = IndexSpace::d2(WIDTH, HEIGHT)?;

    println!("=== Grayscale Negative ===\n");
    let gray: Vec<u8> = (0..WIDTH * HEIGHT).map(|i| (i % 256) as u8).collect();
    let mut image = ctx.allocate_2d::<u8>(WIDTH, HEIGHT)?;
    image.upload(&gray)?;
    ctx.launch(invert_gray(image.view()), space, 64)?;
    let rows = image.download_rows()?;
    println!("row 0 before: {:?}", &gray[..8]);
    println!("row 0 after:  {:?}", &rows[0][..8]);

    println!("\n=== Color Negative ===\n");
    let color: Vec<Rgb> = (0..WIDTH * HEIGHT)
        .map(|i| {
            let x = i % WIDTH;
            let y = i / WIDTH;
            Rgb::new((x * 4) as u8, (y * 5) as u8, 128)
        })
        .collect();
    let mut image = ctx.allocate_2d::<Rgb>(WIDTH, HEIGHT)?;
    image.upload(&color)?;
    ctx.launch(invert_rgb(image.view()), space, 64)?;
    println!("pixel (3, 2): {:?} -> {:?}", color[2 * WIDTH + 3], image.download()[2 * WIDTH + 3]);

    println!("\n=== Radial Projection ===\n");
    let mut input = ctx.allocate_2d::<Rgb>(WIDTH, HEIGHT)?;
    input.upload(&color)?;
    let mut output = ctx.allocate_2d::<Rgb>(WIDTH, HEIGHT)?;
    ctx.launch(radial_project(input.view(), output.view())?, space, 64)?;
    let projected = output.download_rows()?;
    println!("center row: {:?}", &projected[HEIGHT / 2][..4]);

    println!("\n=== Example Complete ===");
    Ok(())
}
