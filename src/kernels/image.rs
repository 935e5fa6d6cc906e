//! Pixel kernels over row-major 2D buffers.
//!
//! Decoding and encoding images is left to the caller; these kernels only
//! see plain `u8` or [`Rgb`] grids.

use crate::error::{Error, Result};
use crate::index::{Extent, Index2D};
use crate::kernel::{Kernel, KernelFn, WorkItem};
use crate::memory::ArrayView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn inverted(self) -> Self {
        Self::new(255 - self.r, 255 - self.g, 255 - self.b)
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

/// `p = 255 - p` on a grayscale image.
pub fn invert_gray(pixels: ArrayView<u8>) -> impl Kernel {
    KernelFn::new("invert_gray", move |item: &WorkItem| {
        pixels.update_2d(item.index_2d(), |p| 255 - p)
    })
}

/// Per-channel inversion of a color image.
pub fn invert_rgb(pixels: ArrayView<Rgb>) -> impl Kernel {
    KernelFn::new("invert_rgb", move |item: &WorkItem| {
        pixels.update_2d(item.index_2d(), Rgb::inverted)
    })
}

/// Radial remap of `input` into `output`.
///
/// A pixel at distance `d` from the center is read from distance
/// `d^2 / max_d` along the same angle, where `max_d` is the center's
/// distance from the origin. Source coordinates are clamped into the image.
pub fn radial_project(input: ArrayView<Rgb>, output: ArrayView<Rgb>) -> Result<impl Kernel> {
    let (width, height) = match (input.extent(), output.extent()) {
        (a, b) if a != b => {
            return Err(Error::index_space(format!(
                "radial_project needs matching extents, got {} and {}",
                a, b
            )))
        }
        (Extent::D2 { width, height }, _) => (width, height),
        (other, _) => {
            return Err(Error::index_space(format!(
                "radial_project needs a 2D image, got {}",
                other
            )))
        }
    };

    let center = (width / 2, height / 2);

    Ok(KernelFn::new("radial_project", move |item: &WorkItem| {
        let source = project_source(item.index_2d(), center, width, height);
        output.set_2d(item.index_2d(), input.get_2d(source)?)
    }))
}

fn project_source(at: Index2D, center: (usize, usize), width: usize, height: usize) -> Index2D {
    let dx = at.x as f32 - center.0 as f32;
    let dy = at.y as f32 - center.1 as f32;
    let angle = dy.atan2(dx);
    let far = (dx * dx + dy * dy).sqrt();
    let max_center = ((center.0 * center.0 + center.1 * center.1) as f32).sqrt();

    let far_out = if max_center > 0.0 {
        far * far / max_center
    } else {
        0.0
    };

    let x = (far_out * angle.cos()) as i64 + center.0 as i64;
    let y = (far_out * angle.sin()) as i64 + center.1 as i64;
    Index2D::new(clamp(x, width), clamp(y, height))
}

fn clamp(v: i64, len: usize) -> usize {
    v.clamp(0, len as i64 - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::ExecutionContext;
    use crate::index::IndexSpace;

    fn context() -> ExecutionContext {
        ExecutionContext::new(Config::builder().num_threads(2).build().unwrap()).unwrap()
    }

    #[test]
    fn test_invert_gray() -> Result<()> {
        let ctx = context();
        let mut img = ctx.allocate_2d::<u8>(3, 2)?;
        img.upload(&[0, 10, 255, 128, 1, 254])?;

        ctx.launch(invert_gray(img.view()), IndexSpace::d2(3, 2)?, 4)?;
        assert_eq!(img.download(), vec![255, 245, 0, 127, 254, 1]);
        Ok(())
    }

    #[test]
    fn test_invert_rgb_twice_is_identity() -> Result<()> {
        let ctx = context();
        let original: Vec<Rgb> = (0..12u8).map(|i| Rgb::new(i, i * 2, 255 - i)).collect();
        let mut img = ctx.allocate_2d::<Rgb>(4, 3)?;
        img.upload(&original)?;

        let space = IndexSpace::from_extent(img.extent())?;
        ctx.launch(invert_rgb(img.view()), space, 5)?;
        assert_eq!(img.download()[1], Rgb::new(254, 253, 1));

        ctx.launch(invert_rgb(img.view()), space, 5)?;
        assert_eq!(img.download(), original);
        Ok(())
    }

    #[test]
    fn test_radial_project_center_fixed() -> Result<()> {
        let ctx = context();
        let pixels: Vec<Rgb> = (0..25u8).map(|i| Rgb::new(i, 0, 0)).collect();
        let mut input = ctx.allocate_2d::<Rgb>(5, 5)?;
        input.upload(&pixels)?;
        let mut output = ctx.allocate_2d::<Rgb>(5, 5)?;

        let kernel = radial_project(input.view(), output.view())?;
        ctx.launch(kernel, IndexSpace::d2(5, 5)?, 8)?;

        let out = output.download();
        // center (2, 2) maps onto itself
        assert_eq!(out[2 * 5 + 2], pixels[2 * 5 + 2]);
        Ok(())
    }

    #[test]
    fn test_radial_project_extent_mismatch() -> Result<()> {
        let ctx = context();
        let input = ctx.allocate_2d::<Rgb>(4, 4)?;
        let output = ctx.allocate_2d::<Rgb>(4, 3)?;
        assert!(matches!(
            radial_project(input.view(), output.view()),
            Err(Error::IndexSpace(_))
        ));

        let flat = ctx.allocate::<Rgb>(16)?;
        assert!(matches!(
            radial_project(flat.view(), flat.view()),
            Err(Error::IndexSpace(_))
        ));
        Ok(())
    }

    #[test]
    fn test_source_clamped() {
        let src = project_source(Index2D::new(0, 0), (50, 50), 100, 100);
        assert!(src.x < 100 && src.y < 100);
        let wide = project_source(Index2D::new(99, 0), (50, 5), 100, 10);
        assert!(wide.x < 100 && wide.y < 10);
    }
}
