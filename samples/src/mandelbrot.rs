use crate::{download, execute};
use dispatch::{BufferSpec, Device, Profiling, Result, Session, WorkGeometry};

pub const SOURCE: &str = "assets/mandelbrot.cl";
pub const WIDTH: usize = 4096;
pub const HEIGHT: usize = 3280;
pub const PIXELS_PER_ITEM: usize = 4;

/// 生成 Mandelbrot 集合的亮度图像，像素值为逃逸前的迭代次数映射到 `[0, 255]`。
pub fn mandelbrot<D: Device>(
    session: &mut Session<D>,
    width: usize,
    height: usize,
) -> Result<(Vec<u8>, Profiling)> {
    let geometry = WorkGeometry::tiled(&[width, height], &[PIXELS_PER_ITEM, 1])?;

    let program = session.build_program(SOURCE)?;
    let kernel = session.get_kernel(program, "mandelbrot")?;
    let [output] = session.create_buffers([BufferSpec::write_only(width * height)])?;

    session.bind_argument(kernel, 0, output)?;
    session.bind_argument(kernel, 1, width as i32)?;
    session.bind_argument(kernel, 2, height as i32)?;
    let profiling = execute(session, kernel, &geometry)?;

    Ok((download(session, output, width * height)?, profiling))
}

#[test]
fn test_mandelbrot() {
    use dispatch::common_cpu::Cpu;

    let (width, height) = (64, 48);
    let mut session = Session::<Cpu>::build().unwrap();
    let (image, _) = mandelbrot(&mut session, width, height).unwrap();
    // (-2, -1.5i) 一步逃逸
    assert_eq!(image[0], 3);
    // (-0.5, 0) 在集合内
    assert_eq!(image[height / 2 * width + width / 2], 255);
    // 关于实轴对称
    assert_eq!(image[(height / 2 - 8) * width + 5], image[(height / 2 + 8) * width + 5]);
}
