use rayon::prelude::*;
use std::fmt;

/// 一对结果的绝对误差与相对误差。
pub struct Diff {
    pub abs: f64,
    pub rel: f64,
}

impl Diff {
    pub fn new(a: f64, b: f64) -> Self {
        let abs = (a - b).abs();
        let rel = abs / (a.abs() + b.abs() + f64::EPSILON);
        Self { abs, rel }
    }
}

/// 绝对误差与相对误差都超出阈值的元素记为离群点。
pub struct ErrorCollector {
    threshold: Diff,
    max_diff: Diff,
    outliers: usize,
    count: usize,
}

impl ErrorCollector {
    pub fn new(abs: f64, rel: f64) -> Self {
        Self {
            threshold: Diff { abs, rel },
            max_diff: Diff { abs: 0., rel: 0. },
            outliers: 0,
            count: 0,
        }
    }

    /// 逐元素比较参考结果与设备结果。
    pub fn compare(mut self, reference: &[f32], answer: &[f32]) -> Self {
        assert_eq!(reference.len(), answer.len());
        let diffs = reference
            .par_iter()
            .zip(answer)
            .map(|(&a, &b)| Diff::new(a as _, b as _))
            .collect::<Vec<_>>();
        diffs.into_iter().for_each(|diff| self.push(diff));
        self
    }

    pub fn push(&mut self, diff: Diff) {
        self.max_diff.abs = f64::max(self.max_diff.abs, diff.abs);
        self.max_diff.rel = f64::max(self.max_diff.rel, diff.rel);
        if diff.abs > self.threshold.abs && diff.rel > self.threshold.rel {
            self.outliers += 1;
        }
        self.count += 1;
    }

    /// 离群点数与总数。
    pub fn summary(&self) -> (usize, usize) {
        (self.outliers, self.count)
    }
}

impl fmt::Display for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "abs: {:.3e}, rel: {:.3e}, outliers: {}/{}",
            self.max_diff.abs, self.max_diff.rel, self.outliers, self.count,
        )
    }
}
