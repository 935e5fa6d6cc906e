//! Ready-made kernels: the tree reduction plus a few element-wise and
//! image kernels.

pub mod basic;
pub mod image;
pub mod reduce;

pub use basic::{busy_loop, hello, host_busy_loop, twice};
pub use image::{invert_gray, invert_rgb, radial_project, Rgb};
pub use reduce::{
    compare_with_host, device_sum, divergent_tree_sum_kernel, host_sum, tree_sum_kernel,
    HostBaseline, ReductionReport,
};
