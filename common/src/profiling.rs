use std::fmt;

/// 一次 kernel 执行的设备时间戳，单位为纳秒。
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Profiling {
    pub queued: u64,
    pub submit: u64,
    pub start: u64,
    pub end: u64,
}

impl Profiling {
    /// 命令在队列中等待提交的时间。
    #[inline]
    pub const fn queued_ns(&self) -> u64 {
        self.submit.saturating_sub(self.queued)
    }

    /// 命令提交后等待执行的时间。
    #[inline]
    pub const fn wait_ns(&self) -> u64 {
        self.start.saturating_sub(self.submit)
    }

    #[inline]
    pub const fn run_ns(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

impl fmt::Display for Profiling {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ms = |ns: u64| ns as f64 / 1e6;
        writeln!(f, "Profiling information:")?;
        writeln!(f, "Queued time: \t{:.3}ms", ms(self.queued_ns()))?;
        writeln!(f, "Wait time: \t{:.3}ms", ms(self.wait_ns()))?;
        write!(f, "Run time: \t{:.3}ms", ms(self.run_ns()))
    }
}

#[test]
fn test_display() {
    let p = Profiling {
        queued: 1_000,
        submit: 501_000,
        start: 1_501_000,
        end: 3_501_000,
    };
    assert_eq!(p.queued_ns(), 500_000);
    let text = p.to_string();
    assert!(text.contains("Queued time: \t0.500ms"));
    assert!(text.contains("Wait time: \t1.000ms"));
    assert!(text.ends_with("Run time: \t2.000ms"));
}
