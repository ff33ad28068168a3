use crate::{buffer::BufferEntry, invocation::KernelEntry, program::ProgramEntry};
use common::{DispatchError, Device, Result};
use std::cell::Cell;

/// 一次调度所需的全部设备资源。
///
/// 会话独占设备上下文与其顺序队列，并以竞技场的形式持有所有派生资源。
/// 派生资源只能通过类型化的编号访问，生命周期不超过会话本身。
/// 会话析构时按“kernel、程序、缓冲区、队列与上下文”的顺序归还全部资源。
pub struct Session<D: Device> {
    pub(crate) device: Option<D>,
    pub(crate) programs: Vec<Option<ProgramEntry<D>>>,
    pub(crate) kernels: Vec<Option<KernelEntry<D>>>,
    pub(crate) buffers: Vec<Option<BufferEntry<D>>>,
    /// 已入队的命令数。
    pub(crate) submitted: u64,
    /// 已确认完成的命令数。
    pub(crate) completed: Cell<u64>,
}

/// [`Session::release_all`] 实际归还的资源。
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Teardown {
    pub kernels: usize,
    pub programs: usize,
    pub buffers: usize,
    /// 队列与上下文是否被关闭。
    pub device: bool,
}

impl<D: Device> Default for Session<D> {
    /// 不持有任何资源的空会话。
    fn default() -> Self {
        Self {
            device: None,
            programs: vec![],
            kernels: vec![],
            buffers: vec![],
            submitted: 0,
            completed: Cell::new(0),
        }
    }
}

impl<D: Device> Session<D> {
    /// 打开第一个平台的第一个设备，建立启用性能分析的顺序队列。
    pub fn build() -> Result<Self> {
        D::open().map(Self::with_device)
    }

    /// 包装一个已经打开的设备。
    pub fn with_device(device: D) -> Self {
        log::debug!("session on \"{}\"", device.name());
        let mut session = Self::default();
        session.device = Some(device);
        session
    }

    #[inline]
    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    /// 取得设备，会话已释放时以 `err` 构造错误。
    pub(crate) fn device_or(&self, err: impl FnOnce(String) -> DispatchError) -> Result<&D> {
        match &self.device {
            Some(device) => Ok(device),
            None => Err(err("session has been released".into())),
        }
    }

    /// 按依赖顺序归还全部资源：kernel、程序、缓冲区，最后是队列与上下文。
    ///
    /// 可重复调用，空会话和部分构造的会话上同样安全。
    /// 归还失败只记录警告，不会中止后续的归还。
    pub fn release_all(&mut self) -> Teardown {
        let mut report = Teardown::default();
        let Some(device) = self.device.take() else {
            self.programs.clear();
            self.kernels.clear();
            self.buffers.clear();
            return report;
        };

        for entry in self.kernels.drain(..).flatten() {
            match device.release_kernel(entry.kernel) {
                Ok(()) => report.kernels += 1,
                Err(e) => log::warn!("failed to release kernel \"{}\": {e}", entry.signature.name),
            }
        }
        for entry in self.programs.drain(..).flatten() {
            match device.release_program(entry.program) {
                Ok(()) => report.programs += 1,
                Err(e) => log::warn!("failed to release program \"{}\": {e}", entry.name),
            }
        }
        for entry in self.buffers.drain(..).flatten() {
            match device.release_buffer(entry.buffer) {
                Ok(()) => report.buffers += 1,
                Err(e) => log::warn!("failed to release buffer: {e}"),
            }
        }
        if let Err(e) = device.close() {
            log::warn!("failed to close device: {e}")
        }
        report.device = true;

        log::debug!("{report:?}");
        report
    }
}

impl<D: Device> Drop for Session<D> {
    fn drop(&mut self) {
        self.release_all();
    }
}
