use crate::{download, execute, upload};
use dispatch::{geometry_mismatch, BufferSpec, Device, Profiling, Result, Session, WorkGeometry};
use rayon::prelude::*;

pub const SOURCE: &str = "assets/fir_float.cl";
pub const PIXELS_PER_ITEM: usize = 4;

/// 亮度映射到 `[0, 1]`。
pub fn to_float(luminance: &[u8]) -> Vec<f32> {
    luminance.par_iter().map(|&y| y as f32 / 255.).collect()
}

pub fn to_luminance(values: &[f32]) -> Vec<u8> {
    values.par_iter().map(|&v| (v * 255.) as u8).collect()
}

/// 对浮点亮度图像做 3x3 平滑滤波。
pub fn fir<D: Device>(
    session: &mut Session<D>,
    input: &[f32],
    width: usize,
    height: usize,
) -> Result<(Vec<f32>, Profiling)> {
    let geometry = WorkGeometry::tiled(&[width, height], &[PIXELS_PER_ITEM, 1])?;
    if input.len() != width * height {
        return Err(geometry_mismatch(format!(
            "{} pixels for a {width}x{height} image",
            input.len()
        )));
    }
    let size = std::mem::size_of_val(input);

    let program = session.build_program(SOURCE)?;
    let kernel = session.get_kernel(program, "fir_float")?;
    let [src, dst] =
        session.create_buffers([BufferSpec::read_only(size), BufferSpec::write_only(size)])?;

    upload(session, src, input)?;

    session.bind_argument(kernel, 0, src)?;
    session.bind_argument(kernel, 1, dst)?;
    session.bind_argument(kernel, 2, width as i32)?;
    let profiling = execute(session, kernel, &geometry)?;

    Ok((download(session, dst, input.len())?, profiling))
}
