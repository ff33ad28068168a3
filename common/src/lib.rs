mod argument;
mod error;
mod profiling;
mod signature;

pub use argument::{Access, KernelArg, MapMode, Scalar};
pub use error::{functions::*, DispatchError, ErrorKind, ErrorPosition};
pub use profiling::Profiling;
pub use signature::{
    parse_signatures, AddressSpace, Param, ParamKind, Signature, SignatureError,
};

use std::{ops::Range, ptr::NonNull};

pub type Result<T> = std::result::Result<T, DispatchError>;

/// 加速器后端。
///
/// 实现这个特质的类型代表一个已打开的设备上下文及其唯一的顺序任务队列。
/// 所有派生资源（程序、kernel、缓冲区、事件）都以关联类型的形式交给调用方持有，
/// 调用方负责按“子先于父”的顺序归还它们，最后调用 [`Device::close`]。
pub trait Device: Sized {
    /// 设备可见的存储区域。
    type Buffer;
    /// 编译完成的设备程序。
    type Program;
    /// 程序中的一个入口函数及其参数槽。
    type Kernel;
    /// 一次入队命令的完成句柄。
    type Event;

    /// 打开第一个平台的第一个设备，并创建启用性能分析的顺序队列。
    fn open() -> Result<Self>;

    /// 设备名字，仅用于日志。
    fn name(&self) -> String;

    /// 设备扩展字符串，以空格分隔。
    fn extensions(&self) -> Result<String>;

    /// 从源码构建程序。失败时 [`ErrorKind::CompilationFailed`] 携带完整的编译日志。
    fn build(&self, src: &str, options: &str) -> Result<Self::Program>;

    fn kernel(&self, program: &Self::Program, name: &str) -> Result<Self::Kernel>;

    /// kernel 声明的参数个数。
    fn arity(&self, kernel: &Self::Kernel) -> usize;

    /// 分配带有主机可见后备存储的缓冲区。
    fn alloc(&self, size: usize, access: Access) -> Result<Self::Buffer>;

    /// 阻塞映射 `range` 字节范围，返回主机指针。
    ///
    /// 返回前队列中所有先前提交的命令都已完成。
    fn map(&self, buffer: &Self::Buffer, mode: MapMode, range: Range<usize>)
        -> Result<NonNull<u8>>;

    fn unmap(&self, buffer: &Self::Buffer, ptr: NonNull<u8>) -> Result<()>;

    fn set_arg(
        &self,
        kernel: &mut Self::Kernel,
        index: usize,
        arg: KernelArg<Self::Buffer>,
    ) -> Result<()>;

    /// 以 `global` 为全局尺寸入队，局部尺寸交给运行时决定。
    fn enqueue(&self, kernel: &Self::Kernel, global: &[usize]) -> Result<Self::Event>;

    /// 阻塞直到队列中所有命令完成。
    fn finish(&self) -> Result<()>;

    fn profiling(&self, event: &Self::Event) -> Result<Profiling>;

    fn release_kernel(&self, kernel: Self::Kernel) -> Result<()>;
    fn release_program(&self, program: Self::Program) -> Result<()>;
    fn release_buffer(&self, buffer: Self::Buffer) -> Result<()>;
    fn release_event(&self, event: Self::Event) -> Result<()>;

    /// 依次释放队列和上下文。
    fn close(self) -> Result<()>;
}
