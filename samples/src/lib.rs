pub mod image;

pub mod fir_float;
pub mod hello_world_c;
pub mod hello_world_opencl;
pub mod long_vectors;
pub mod mandelbrot;
pub mod sgemm;
pub mod sobel;
pub mod template;

#[cfg(test)]
mod test_utils;

use bytemuck::Pod;
use dispatch::{BufferId, Device, KernelId, MapMode, Profiling, Result, Session, WorkGeometry};
use std::{error::Error, process::ExitCode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 示例程序使用的设备。
#[cfg(not(feature = "opencl"))]
pub type Backend = dispatch::common_cpu::Cpu;
#[cfg(feature = "opencl")]
pub type Backend = dispatch::opencl::ClDevice;

/// 将 `data` 写入缓冲区开头。
pub fn upload<D: Device, T: Pod>(session: &Session<D>, buffer: BufferId, data: &[T]) -> Result<()> {
    let bytes = bytemuck::cast_slice::<T, u8>(data);
    let mut view = session.map(buffer, MapMode::Write, 0..bytes.len())?;
    view.bytes_mut()?.copy_from_slice(bytes);
    view.unmap()
}

/// 读回缓冲区开头的 `len` 个元素。
pub fn download<D: Device, T: Pod>(session: &Session<D>, buffer: BufferId, len: usize) -> Result<Vec<T>> {
    let view = session.map(buffer, MapMode::Read, 0..len * std::mem::size_of::<T>())?;
    let ans = view.as_slice::<T>()?.to_vec();
    view.unmap()?;
    Ok(ans)
}

/// 入队 kernel 并等待完成，返回其性能分析信息。
pub fn execute<D: Device>(
    session: &mut Session<D>,
    kernel: KernelId,
    geometry: &WorkGeometry,
) -> Result<Profiling> {
    let event = session.enqueue(kernel, geometry)?;
    session.wait(&event)?;
    let profiling = session.read_profiling(&event)?;
    session.release_event(event)?;
    Ok(profiling)
}

/// 示例程序的入口：安装日志，执行 `f`，失败时打印错误并以 1 退出。
pub fn main_with(f: impl FnOnce() -> std::result::Result<(), Box<dyn Error>>) -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match f() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
