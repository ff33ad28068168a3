use common::{geometry_mismatch, Result};

/// 工作项网格的全局尺寸，1 到 3 维，每维都为正。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WorkGeometry {
    dims: [usize; 3],
    ndim: usize,
}

impl WorkGeometry {
    pub fn new(global: &[usize]) -> Result<Self> {
        if !(1..=3).contains(&global.len()) {
            return Err(geometry_mismatch(format!(
                "{} dimensions, 1 to 3 expected",
                global.len()
            )));
        }
        if let Some(i) = global.iter().position(|&d| d == 0) {
            return Err(geometry_mismatch(format!("dimension {i} is zero")));
        }
        let mut dims = [1; 3];
        dims[..global.len()].copy_from_slice(global);
        Ok(Self {
            dims,
            ndim: global.len(),
        })
    }

    /// 每个工作项处理 `per_item` 个元素时的网格。
    ///
    /// 每一维的输入尺寸都必须能被对应的比例整除，否则末尾的元素将无人处理。
    pub fn tiled(extent: &[usize], per_item: &[usize]) -> Result<Self> {
        if extent.len() != per_item.len() || extent.len() > 3 {
            return Err(geometry_mismatch(format!(
                "extent {extent:?} and ratio {per_item:?} do not describe a 1 to 3 dimensional grid"
            )));
        }
        let mut global = [0; 3];
        for (i, (&e, &r)) in extent.iter().zip(per_item).enumerate() {
            if r == 0 || e % r != 0 {
                return Err(geometry_mismatch(format!(
                    "extent {e} of dimension {i} is not divisible by {r}"
                )));
            }
            global[i] = e / r;
        }
        Self::new(&global[..extent.len()])
    }

    #[inline]
    pub fn global(&self) -> &[usize] {
        &self.dims[..self.ndim]
    }

    #[inline]
    pub const fn ndim(&self) -> usize {
        self.ndim
    }

    #[inline]
    pub fn work_items(&self) -> usize {
        self.dims.iter().product()
    }
}

#[cfg(test)]
mod test {
    use super::WorkGeometry;
    use common::ErrorKind;

    #[test]
    fn test_tiled() {
        let g = WorkGeometry::tiled(&[1920, 1080], &[16, 1]).unwrap();
        assert_eq!(g.global(), [120, 1080]);
        assert_eq!(g.ndim(), 2);
        assert_eq!(g.work_items() * 16, 1920 * 1080);

        let g = WorkGeometry::tiled(&[4096, 3280], &[4, 1]).unwrap();
        assert_eq!(g.global(), [1024, 3280]);

        let g = WorkGeometry::tiled(&[1_000_000], &[1]).unwrap();
        assert_eq!(g.global(), [1_000_000]);
    }

    #[test]
    fn test_covers_every_element_once() {
        let (width, height, ratio) = (64, 5, 16);
        let g = WorkGeometry::tiled(&[width, height], &[ratio, 1]).unwrap();
        let mut touched = vec![0u8; width * height];
        let [gx, gy] = [g.global()[0], g.global()[1]];
        for y in 0..gy {
            for x in 0..gx {
                for i in x * ratio..(x + 1) * ratio {
                    touched[y * width + i] += 1;
                }
            }
        }
        assert!(touched.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_rejects() {
        let kind = |r: common::Result<WorkGeometry>| r.unwrap_err().kind;
        assert_eq!(
            kind(WorkGeometry::tiled(&[1000], &[16])),
            ErrorKind::GeometryMismatch
        );
        assert_eq!(
            kind(WorkGeometry::tiled(&[16, 4], &[16])),
            ErrorKind::GeometryMismatch
        );
        assert_eq!(kind(WorkGeometry::tiled(&[16], &[0])), ErrorKind::GeometryMismatch);
        assert_eq!(kind(WorkGeometry::new(&[])), ErrorKind::GeometryMismatch);
        assert_eq!(kind(WorkGeometry::new(&[1, 1, 1, 1])), ErrorKind::GeometryMismatch);
        assert_eq!(kind(WorkGeometry::new(&[8, 0])), ErrorKind::GeometryMismatch);
    }
}
