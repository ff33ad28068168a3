use crate::{download, execute, upload};
use dispatch::{geometry_mismatch, BufferSpec, Device, Profiling, Result, Session, WorkGeometry};
use rayon::prelude::*;

pub const SOURCE: &str = "assets/sobel.cl";
/// 每个工作项处理同一行中的像素数。
pub const PIXELS_PER_ITEM: usize = 16;

/// 亮度图像的水平与垂直梯度。
pub struct Gradients {
    pub width: usize,
    pub height: usize,
    pub dx: Vec<i8>,
    pub dy: Vec<i8>,
}

impl Gradients {
    /// `|dX|`、`|dY|` 与二者合成的梯度幅值。
    pub fn magnitudes(&self) -> [Vec<u8>; 3] {
        let abs = |g: &[i8]| g.par_iter().map(|x| x.unsigned_abs()).collect::<Vec<_>>();
        let dx = abs(&self.dx);
        let dy = abs(&self.dy);
        let total = dx
            .par_iter()
            .zip(&dy)
            .map(|(&x, &y)| f32::from(x).hypot(f32::from(y)) as u8)
            .collect();
        [dx, dy, total]
    }
}

/// 对 `width` 必须是 16 的整数倍的亮度图像做 Sobel 边缘检测。
pub fn sobel<D: Device>(
    session: &mut Session<D>,
    luminance: &[u8],
    width: usize,
    height: usize,
) -> Result<(Gradients, Profiling)> {
    let geometry = WorkGeometry::tiled(&[width, height], &[PIXELS_PER_ITEM, 1])?;
    let size = width * height;
    if luminance.len() != size {
        return Err(geometry_mismatch(format!(
            "{} pixels for a {width}x{height} image",
            luminance.len()
        )));
    }

    let program = session.build_program(SOURCE)?;
    let kernel = session.get_kernel(program, "sobel")?;
    let [input, dx, dy] = session.create_buffers([
        BufferSpec::read_only(size),
        BufferSpec::write_only(size),
        BufferSpec::write_only(size),
    ])?;

    upload(session, input, luminance)?;

    session.bind_argument(kernel, 0, input)?;
    session.bind_argument(kernel, 1, width as i32)?;
    session.bind_argument(kernel, 2, dx)?;
    session.bind_argument(kernel, 3, dy)?;
    let profiling = execute(session, kernel, &geometry)?;

    let gradients = Gradients {
        width,
        height,
        dx: download(session, dx, size)?,
        dy: download(session, dy, size)?,
    };
    Ok((gradients, profiling))
}

#[cfg(test)]
mod test {
    use super::sobel;
    use crate::image;
    use dispatch::{common_cpu::Cpu, ErrorKind, Session};

    #[test]
    fn test_zero_image() {
        let (width, height) = (128, 32);
        let mut session = Session::<Cpu>::build().unwrap();
        let (gradients, _) = sobel(&mut session, &vec![0; width * height], width, height).unwrap();
        assert!(gradients.dx.iter().chain(&gradients.dy).all(|&g| g == 0));
    }

    #[test]
    fn test_vertical_edge() {
        // 左半黑，右半白
        let (width, height) = (32, 4);
        let image = (0..width * height)
            .map(|i| if i % width < width / 2 { 0 } else { 255 })
            .collect::<Vec<u8>>();

        let mut session = Session::<Cpu>::build().unwrap();
        let (gradients, _) = sobel(&mut session, &image, width, height).unwrap();
        let [dx, dy, total] = gradients.magnitudes();
        for y in 0..height {
            let row = &dx[y * width..][..width];
            // (255 + 2 * 255 + 255) >> 3
            assert_eq!(row[width / 2 - 1], 127);
            assert_eq!(row[width / 2], 127);
            assert_eq!(row[0], 0);
        }
        assert!(dy.iter().all(|&g| g == 0));
        assert_eq!(total, dx);
    }

    #[test]
    fn test_input_image() {
        let bitmap = image::load("assets/input.bmp").unwrap();
        let mut luminance = vec![0; bitmap.width * bitmap.height];
        image::rgb_to_luminance(&bitmap.pixels, &mut luminance);

        let mut session = Session::<Cpu>::build().unwrap();
        let (gradients, profiling) =
            sobel(&mut session, &luminance, bitmap.width, bitmap.height).unwrap();
        assert!(profiling.start <= profiling.end);
        let [_, _, total] = gradients.magnitudes();
        assert!(total.iter().any(|&g| g != 0));
    }

    #[test]
    fn test_indivisible_width() {
        let mut session = Session::<Cpu>::build().unwrap();
        let e = sobel(&mut session, &[0; 20 * 2], 20, 2).err().unwrap();
        assert_eq!(e.kind, ErrorKind::GeometryMismatch);
    }
}
