use crate::Session;
use bytemuck::Pod;
use common::{allocation_failed, map_failed, unmap_failed, Access, Device, MapMode, Result};
use std::{
    cell::Cell,
    ops::Range,
    ptr::NonNull,
    slice::{from_raw_parts, from_raw_parts_mut},
};

/// 会话中某个缓冲区的编号。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferId(pub(crate) usize);

/// 缓冲区的大小（字节）与 kernel 侧访问方向。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BufferSpec {
    pub size: usize,
    pub access: Access,
}

impl BufferSpec {
    #[inline]
    pub const fn read_only(size: usize) -> Self {
        Self {
            size,
            access: Access::ReadOnly,
        }
    }

    #[inline]
    pub const fn write_only(size: usize) -> Self {
        Self {
            size,
            access: Access::WriteOnly,
        }
    }

    #[inline]
    pub const fn read_write(size: usize) -> Self {
        Self {
            size,
            access: Access::ReadWrite,
        }
    }
}

pub(crate) struct BufferEntry<D: Device> {
    pub buffer: D::Buffer,
    pub spec: BufferSpec,
    pub mapped: Cell<bool>,
}

impl<D: Device> Session<D> {
    /// 按顺序分配一组缓冲区。
    ///
    /// 任何一个失败都将以 [`common::ErrorKind::AllocationFailed`] 报告其序号，
    /// 已经分配的缓冲区仍归会话所有，由会话释放。
    pub fn create_buffers<const N: usize>(
        &mut self,
        specs: [BufferSpec; N],
    ) -> Result<[BufferId; N]> {
        let mut ids = [BufferId(usize::MAX); N];
        for (i, spec) in specs.into_iter().enumerate() {
            let device = self.device_or(|info| allocation_failed(i, info))?;
            let buffer = device
                .alloc(spec.size, spec.access)
                .map_err(|e| e.at_index(i))?;
            ids[i] = BufferId(self.buffers.len());
            self.buffers.push(Some(BufferEntry {
                buffer,
                spec,
                mapped: Cell::new(false),
            }));
        }
        log::debug!("created {N} buffer(s)");
        Ok(ids)
    }

    pub fn buffer_spec(&self, buffer: BufferId) -> Option<BufferSpec> {
        self.buffer(buffer).map(|b| b.spec)
    }

    pub(crate) fn buffer(&self, buffer: BufferId) -> Option<&BufferEntry<D>> {
        self.buffers.get(buffer.0).and_then(Option::as_ref)
    }

    /// 阻塞映射缓冲区的 `range` 字节范围，返回前所有已提交的命令都已完成。
    ///
    /// 同一缓冲区同时至多有一个映射视图。
    pub fn map(
        &self,
        buffer: BufferId,
        mode: MapMode,
        range: Range<usize>,
    ) -> Result<MappedView<'_, D>> {
        let device = self.device_or(map_failed)?;
        let Some(entry) = self.buffer(buffer) else {
            return Err(map_failed(format!("{buffer:?} does not exist")));
        };
        if entry.mapped.get() {
            return Err(map_failed(format!("{buffer:?} is already mapped")));
        }
        if range.start > range.end || range.end > entry.spec.size {
            return Err(map_failed(format!(
                "range {range:?} is outside {buffer:?} of {} bytes",
                entry.spec.size
            )));
        }
        let ptr = device.map(&entry.buffer, mode, range.clone())?;
        entry.mapped.set(true);
        Ok(MappedView {
            session: self,
            buffer,
            ptr,
            mode,
            range,
            live: true,
        })
    }

    /// 映射整个缓冲区。
    pub fn map_all(&self, buffer: BufferId, mode: MapMode) -> Result<MappedView<'_, D>> {
        let size = self
            .buffer(buffer)
            .map_or(0, |entry| entry.spec.size);
        self.map(buffer, mode, 0..size)
    }

    /// 结束映射，视图随之失效。
    pub fn unmap(&self, mut view: MappedView<D>) -> Result<()> {
        if !std::ptr::eq(view.session, self) {
            return Err(unmap_failed(format!(
                "{:?} is mapped by another session",
                view.buffer
            )));
        }
        // 解除失败时视图保持存活，析构时会再试一次
        self.unmap_raw(view.buffer, view.ptr)?;
        view.live = false;
        Ok(())
    }

    fn unmap_raw(&self, buffer: BufferId, ptr: NonNull<u8>) -> Result<()> {
        let device = self.device_or(unmap_failed)?;
        let Some(entry) = self.buffer(buffer) else {
            return Err(unmap_failed(format!("{buffer:?} does not exist")));
        };
        if !entry.mapped.get() {
            return Err(unmap_failed(format!("{buffer:?} is not mapped")));
        }
        device.unmap(&entry.buffer, ptr)?;
        entry.mapped.set(false);
        Ok(())
    }
}

/// 缓冲区在主机地址空间中的映射。
///
/// 视图不可变地借用会话，存活期间无法绑定参数或入队 kernel。
/// 未经 [`Session::unmap`] 就析构的视图会在析构时自动解除映射并给出警告。
pub struct MappedView<'a, D: Device> {
    session: &'a Session<D>,
    buffer: BufferId,
    ptr: NonNull<u8>,
    mode: MapMode,
    range: Range<usize>,
    live: bool,
}

impl<D: Device> MappedView<'_, D> {
    #[inline]
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    #[inline]
    pub fn mode(&self) -> MapMode {
        self.mode
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        unsafe { from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    /// 只读映射的视图不可写。
    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        if !self.mode.writable() {
            return Err(map_failed(format!("{:?} is mapped for reading", self.buffer)));
        }
        Ok(unsafe { from_raw_parts_mut(self.ptr.as_ptr(), self.len()) })
    }

    /// 按 `T` 解释映射内容，长度或对齐不符时失败。
    pub fn as_slice<T: Pod>(&self) -> Result<&[T]> {
        bytemuck::try_cast_slice(self.bytes())
            .map_err(|e| map_failed(format!("cannot view {:?} as [{}]: {e:?}", self.buffer, std::any::type_name::<T>())))
    }

    pub fn as_slice_mut<T: Pod>(&mut self) -> Result<&mut [T]> {
        let buffer = self.buffer;
        bytemuck::try_cast_slice_mut(self.bytes_mut()?)
            .map_err(|e| map_failed(format!("cannot view {buffer:?} as [{}]: {e:?}", std::any::type_name::<T>())))
    }

    /// 等价于 [`Session::unmap`]。
    #[inline]
    pub fn unmap(self) -> Result<()> {
        let session = self.session;
        session.unmap(self)
    }
}

impl<D: Device> Drop for MappedView<'_, D> {
    fn drop(&mut self) {
        if self.live {
            log::warn!("{:?} dropped while mapped, unmapping", self.buffer);
            if let Err(e) = self.session.unmap_raw(self.buffer, self.ptr) {
                log::warn!("{e}")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{BufferSpec, Session};
    use common::{
        unmap_failed, Access, Device, ErrorKind, KernelArg, MapMode, Profiling, Result,
    };
    use common_cpu::Cpu;
    use std::{cell::Cell, ops::Range, ptr::NonNull};

    #[test]
    fn test_map_alternation() {
        let mut session = Session::<Cpu>::build().unwrap();
        let [buf] = session.create_buffers([BufferSpec::read_write(64)]).unwrap();

        let view = session.map_all(buf, MapMode::Write).unwrap();
        let e = session.map(buf, MapMode::Read, 0..8).err().unwrap();
        assert_eq!(e.kind, ErrorKind::MapFailed);
        session.unmap(view).unwrap();

        let view = session.map(buf, MapMode::Read, 8..16).unwrap();
        assert_eq!(view.len(), 8);
        view.unmap().unwrap();

        let e = session.map(buf, MapMode::Read, 60..68).err().unwrap();
        assert_eq!(e.kind, ErrorKind::MapFailed);
    }

    #[test]
    fn test_unmap_foreign_view() {
        let mut a = Session::<Cpu>::build().unwrap();
        let mut b = Session::<Cpu>::build().unwrap();
        let [buf_a] = a.create_buffers([BufferSpec::read_write(4)]).unwrap();
        b.create_buffers([BufferSpec::read_write(4)]).unwrap();

        let view = a.map_all(buf_a, MapMode::Read).unwrap();
        let e = b.unmap(view).unwrap_err();
        assert_eq!(e.kind, ErrorKind::UnmapFailed);
        // 失败的 unmap 消耗了视图，析构时已在 a 上自动解除映射
        a.map_all(buf_a, MapMode::Read).unwrap().unmap().unwrap();
    }

    #[test]
    fn test_write_then_read() {
        let mut session = Session::<Cpu>::build().unwrap();
        let [buf] = session.create_buffers([BufferSpec::read_only(16)]).unwrap();

        let mut view = session.map_all(buf, MapMode::Write).unwrap();
        view.as_slice_mut::<u32>().unwrap().copy_from_slice(&[1, 2, 3, 4]);
        view.unmap().unwrap();

        let mut view = session.map_all(buf, MapMode::Read).unwrap();
        assert_eq!(view.as_slice::<u32>().unwrap(), [1, 2, 3, 4]);
        assert!(view.as_slice::<[u8; 3]>().is_err());
        assert_eq!(view.bytes_mut().unwrap_err().kind, ErrorKind::MapFailed);
        view.unmap().unwrap();
    }

    /// 第一次解除映射失败的设备。
    struct FlakyUnmap {
        cpu: Cpu,
        failed: Cell<bool>,
    }

    impl Device for FlakyUnmap {
        type Buffer = <Cpu as Device>::Buffer;
        type Program = <Cpu as Device>::Program;
        type Kernel = <Cpu as Device>::Kernel;
        type Event = <Cpu as Device>::Event;

        fn open() -> Result<Self> {
            Cpu::open().map(|cpu| Self {
                cpu,
                failed: Cell::new(false),
            })
        }
        fn name(&self) -> String {
            self.cpu.name()
        }
        fn extensions(&self) -> Result<String> {
            self.cpu.extensions()
        }
        fn build(&self, src: &str, options: &str) -> Result<Self::Program> {
            self.cpu.build(src, options)
        }
        fn kernel(&self, program: &Self::Program, name: &str) -> Result<Self::Kernel> {
            self.cpu.kernel(program, name)
        }
        fn arity(&self, kernel: &Self::Kernel) -> usize {
            self.cpu.arity(kernel)
        }
        fn alloc(&self, size: usize, access: Access) -> Result<Self::Buffer> {
            self.cpu.alloc(size, access)
        }
        fn map(&self, buffer: &Self::Buffer, mode: MapMode, range: Range<usize>) -> Result<NonNull<u8>> {
            self.cpu.map(buffer, mode, range)
        }
        fn unmap(&self, buffer: &Self::Buffer, ptr: NonNull<u8>) -> Result<()> {
            if !self.failed.replace(true) {
                return Err(unmap_failed("device busy"));
            }
            self.cpu.unmap(buffer, ptr)
        }
        fn set_arg(&self, kernel: &mut Self::Kernel, index: usize, arg: KernelArg<Self::Buffer>) -> Result<()> {
            self.cpu.set_arg(kernel, index, arg)
        }
        fn enqueue(&self, kernel: &Self::Kernel, global: &[usize]) -> Result<Self::Event> {
            self.cpu.enqueue(kernel, global)
        }
        fn finish(&self) -> Result<()> {
            self.cpu.finish()
        }
        fn profiling(&self, event: &Self::Event) -> Result<Profiling> {
            self.cpu.profiling(event)
        }
        fn release_kernel(&self, kernel: Self::Kernel) -> Result<()> {
            self.cpu.release_kernel(kernel)
        }
        fn release_program(&self, program: Self::Program) -> Result<()> {
            self.cpu.release_program(program)
        }
        fn release_buffer(&self, buffer: Self::Buffer) -> Result<()> {
            self.cpu.release_buffer(buffer)
        }
        fn release_event(&self, event: Self::Event) -> Result<()> {
            self.cpu.release_event(event)
        }
        fn close(self) -> Result<()> {
            self.cpu.close()
        }
    }

    #[test]
    fn test_failed_unmap_retried() {
        let mut session = Session::<FlakyUnmap>::build().unwrap();
        let [buf] = session.create_buffers([BufferSpec::read_write(4)]).unwrap();

        let view = session.map_all(buf, MapMode::Read).unwrap();
        assert_eq!(session.unmap(view).unwrap_err().kind, ErrorKind::UnmapFailed);
        // 视图析构时重新解除映射，缓冲区可以再次映射
        session.map_all(buf, MapMode::Read).unwrap().unmap().unwrap();
    }

    #[test]
    fn test_drop_unmaps() {
        let mut session = Session::<Cpu>::build().unwrap();
        let [buf] = session.create_buffers([BufferSpec::read_write(4)]).unwrap();
        drop(session.map_all(buf, MapMode::ReadWrite).unwrap());
        session.map_all(buf, MapMode::Read).unwrap().unmap().unwrap();
    }
}
