//! 24 位 BMP 读写与亮度转换。
//!
//! 内存中的像素一律为交错 RGB、行主序、首行在上、行间无填充。

use dispatch::ErrorPosition;
use rayon::prelude::*;
use std::{error::Error, fmt, fs, io, panic::Location, path::Path};

const FILE_HEADER: usize = 14;
const INFO_HEADER: usize = 40;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

/// 图像读写失败，记录失败发生的源码位置。
#[derive(Debug)]
pub enum ImageError {
    /// 位置信息携带文件路径。
    Io(ErrorPosition, io::Error),
    /// 位置信息携带文件路径与格式问题。
    Format(ErrorPosition),
}

impl ImageError {
    #[track_caller]
    fn io(path: &Path, e: io::Error) -> Self {
        Self::Io(locate(path.display().to_string()), e)
    }

    #[track_caller]
    fn format(path: &Path, msg: impl fmt::Display) -> Self {
        Self::Format(locate(format!("{}: {msg}", path.display())))
    }

    pub fn position(&self) -> &ErrorPosition {
        match self {
            Self::Io(position, _) | Self::Format(position) => position,
        }
    }
}

#[track_caller]
fn locate(message: String) -> ErrorPosition {
    let location = Location::caller();
    ErrorPosition::new(location.file(), location.line(), message)
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let position = self.position();
        write!(f, "{}:{}: {}", position.file(), position.line(), position.message())?;
        match self {
            Self::Io(_, e) => write!(f, ": {e}"),
            Self::Format(_) => Ok(()),
        }
    }
}

impl Error for ImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(_, e) => Some(e),
            Self::Format(_) => None,
        }
    }
}

#[inline]
const fn stride(width: usize) -> usize {
    (width * 3 + 3) & !3
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0; 4];
    buf.copy_from_slice(&bytes[offset..][..4]);
    u32::from_le_bytes(buf)
}

pub fn load(path: impl AsRef<Path>) -> Result<Bitmap, ImageError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| ImageError::io(path, e))?;
    decode(&bytes).map_err(|msg| ImageError::format(path, format_args!("not a 24-bit bitmap: {msg}")))
}

pub fn save(path: impl AsRef<Path>, width: usize, height: usize, pixels: &[u8]) -> Result<(), ImageError> {
    let path = path.as_ref();
    if width == 0 || height == 0 {
        return Err(ImageError::format(path, format_args!("empty image {width}x{height}")));
    }
    if pixels.len() != width * height * 3 {
        return Err(ImageError::format(
            path,
            format_args!("{} bytes for {width}x{height} pixels", pixels.len()),
        ));
    }
    fs::write(path, encode(width, height, pixels)).map_err(|e| ImageError::io(path, e))
}

fn decode(bytes: &[u8]) -> Result<Bitmap, String> {
    if bytes.len() < FILE_HEADER + INFO_HEADER || &bytes[..2] != b"BM" {
        return Err("missing BM header".into());
    }
    let offset = u32_at(bytes, 10) as usize;
    let width = u32_at(bytes, 18) as i32;
    let height = u32_at(bytes, 22) as i32;
    let bpp = u16_at(bytes, 28);
    let compression = u32_at(bytes, 30);
    if bpp != 24 || compression != 0 {
        return Err(format!("{bpp} bits per pixel, compression {compression}"));
    }
    if width <= 0 || height == 0 {
        return Err(format!("invalid size {width}x{height}"));
    }

    // 高度为正时首行在文件末尾
    let bottom_up = height > 0;
    let (width, height) = (width as usize, height.unsigned_abs() as usize);
    let stride = stride(width);
    if bytes.len() < offset + stride * height {
        return Err("truncated pixel data".into());
    }

    let mut pixels = vec![0; width * height * 3];
    pixels
        .chunks_exact_mut(width * 3)
        .enumerate()
        .for_each(|(y, row)| {
            let src = if bottom_up { height - 1 - y } else { y };
            let src = &bytes[offset + src * stride..][..width * 3];
            for (dst, bgr) in row.chunks_exact_mut(3).zip(src.chunks_exact(3)) {
                dst.copy_from_slice(&[bgr[2], bgr[1], bgr[0]]);
            }
        });
    Ok(Bitmap {
        width,
        height,
        pixels,
    })
}

fn encode(width: usize, height: usize, pixels: &[u8]) -> Vec<u8> {
    let stride = stride(width);
    let data = stride * height;
    let offset = FILE_HEADER + INFO_HEADER;

    let mut out = Vec::with_capacity(offset + data);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&((offset + data) as u32).to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&(offset as u32).to_le_bytes());

    out.extend_from_slice(&(INFO_HEADER as u32).to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(data as u32).to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&[0; 8]);

    for row in pixels.chunks_exact(width * 3).rev() {
        for rgb in row.chunks_exact(3) {
            out.extend_from_slice(&[rgb[2], rgb[1], rgb[0]]);
        }
        out.resize(out.len() + stride - width * 3, 0);
    }
    out
}

/// BT.601 加权：`0.299 R + 0.587 G + 0.114 B`。
pub fn rgb_to_luminance(rgb: &[u8], luminance: &mut [u8]) {
    assert_eq!(rgb.len(), luminance.len() * 3);
    luminance
        .par_iter_mut()
        .zip(rgb.par_chunks_exact(3))
        .for_each(|(y, p)| {
            let [r, g, b] = [p[0], p[1], p[2]].map(f32::from);
            *y = (0.299 * r + 0.587 * g + 0.114 * b) as u8
        });
}

/// 灰度复制到三个通道。
pub fn luminance_to_rgb(luminance: &[u8], rgb: &mut [u8]) {
    assert_eq!(rgb.len(), luminance.len() * 3);
    rgb.par_chunks_exact_mut(3)
        .zip(luminance.par_iter())
        .for_each(|(p, &y)| p.fill(y));
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bitmap() {
        // 宽 5 像素的行需要 1 字节填充
        let (width, height) = (5, 3);
        let pixels = (0..width * height * 3).map(|i| i as u8).collect::<Vec<_>>();
        let bytes = encode(width, height, &pixels);
        assert_eq!(bytes.len(), 54 + 16 * 3);
        // 文件中首先存放最后一行
        assert_eq!(&bytes[54..57], &[32, 31, 30][..]);

        let bitmap = decode(&bytes).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (width, height));
        assert_eq!(bitmap.pixels, pixels);

        assert!(decode(&bytes[..60]).is_err());
        assert!(decode(b"PNG").is_err());
    }

    #[test]
    fn test_load_asset() {
        let bitmap = load("assets/input.bmp").unwrap();
        assert_eq!(bitmap.width % 16, 0);
        assert_eq!(bitmap.pixels.len(), bitmap.width * bitmap.height * 3);
        assert!(matches!(load("assets/missing.bmp"), Err(ImageError::Io(..))));
    }

    #[test]
    fn test_error_position() {
        let e = load("assets/missing.bmp").unwrap_err();
        assert_eq!(e.position().file(), file!());
        assert_eq!(e.position().message(), "assets/missing.bmp");
        let text = e.to_string();
        assert!(text.starts_with(&format!("{}:{}: assets/missing.bmp: ", file!(), e.position().line())));
    }

    #[test]
    fn test_save_empty() {
        let path = std::env::temp_dir().join("samples-empty.bmp");
        for (width, height) in [(0, 4), (4, 0), (0, 0)] {
            let e = save(&path, width, height, &[]).unwrap_err();
            assert!(matches!(e, ImageError::Format(_)));
            assert!(e.to_string().contains("empty image"));
        }
    }

    #[test]
    fn test_luminance() {
        let rgb = [0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255];
        let mut luminance = [0; 4];
        rgb_to_luminance(&rgb, &mut luminance);
        assert_eq!(luminance, [0, 76, 149, 29]);

        let mut back = [0; 12];
        luminance_to_rgb(&luminance, &mut back);
        assert_eq!(&back[3..6], &[76, 76, 76]);
    }
}
