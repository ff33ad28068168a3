//! 64 位整数与 64 位原子操作：求图像像素值之和与平方和。

use crate::{download, execute, upload};
use dispatch::{
    geometry_mismatch, platform_unavailable, BufferSpec, Device, Profiling, Result, Session,
    WorkGeometry,
};

pub const SOURCE: &str = "assets/64_bit_integer.cl";
pub const EXTENSION: &str = "cl_khr_int64_base_atomics";
pub const PIXELS_PER_ITEM: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PixelSums {
    pub square: u64,
    pub sum: u64,
}

impl PixelSums {
    pub fn of(pixels: &[u8]) -> Self {
        pixels.iter().fold(Self { square: 0, sum: 0 }, |acc, &p| {
            let p = p as u64;
            Self {
                square: acc.square + p * p,
                sum: acc.sum + p,
            }
        })
    }
}

/// 设备不支持 64 位原子操作时失败。
pub fn pixel_sums<D: Device>(session: &mut Session<D>, pixels: &[u8]) -> Result<(PixelSums, Profiling)> {
    if !session.supports(EXTENSION) {
        return Err(platform_unavailable(format!(
            "{EXTENSION} is not supported on this device"
        )));
    }
    if pixels.is_empty() {
        return Err(geometry_mismatch("empty image"));
    }
    let geometry = WorkGeometry::tiled(&[pixels.len()], &[PIXELS_PER_ITEM])?;

    let program = session.build_program(SOURCE)?;
    let kernel = session.get_kernel(program, "long_vectors")?;
    let [image, square, sum] = session.create_buffers([
        BufferSpec::read_only(pixels.len()),
        BufferSpec::read_write(8),
        BufferSpec::read_write(8),
    ])?;

    upload(session, image, pixels)?;
    upload(session, square, &[0u64])?;
    upload(session, sum, &[0u64])?;

    session.bind_argument(kernel, 0, image)?;
    session.bind_argument(kernel, 1, square)?;
    session.bind_argument(kernel, 2, sum)?;
    let profiling = execute(session, kernel, &geometry)?;

    let sums = PixelSums {
        square: download::<_, u64>(session, square, 1)?[0],
        sum: download::<_, u64>(session, sum, 1)?[0],
    };
    Ok((sums, profiling))
}

#[cfg(test)]
mod test {
    use super::{pixel_sums, PixelSums};
    use dispatch::{
        common_cpu::{Cpu, HostConfig, HostDevice},
        ErrorKind, Session,
    };
    use rand::Rng;

    #[test]
    fn test_pixel_sums() {
        let mut rng = rand::thread_rng();
        let pixels = (0..64 * 48).map(|_| rng.gen()).collect::<Vec<u8>>();

        let mut session = Session::<Cpu>::build().unwrap();
        let (sums, _) = pixel_sums(&mut session, &pixels).unwrap();
        assert_eq!(sums, PixelSums::of(&pixels));
    }

    #[test]
    fn test_unsupported() {
        let cpu = Cpu::with_config(HostConfig::single(HostDevice {
            extensions: "cl_khr_byte_addressable_store".into(),
            ..Default::default()
        }))
        .unwrap();
        let mut session = Session::with_device(cpu);
        let e = pixel_sums(&mut session, &[1; 64]).unwrap_err();
        assert_eq!(e.kind, ErrorKind::PlatformUnavailable);
        assert!(e.info().contains("cl_khr_int64_base_atomics"));
        // 失败发生在构建程序之前
        assert_eq!(session.release_all().programs, 0);
    }

    #[test]
    fn test_indivisible() {
        let mut session = Session::<Cpu>::build().unwrap();
        let e = pixel_sums(&mut session, &[1; 12]).unwrap_err();
        assert_eq!(e.kind, ErrorKind::GeometryMismatch);
    }
}
