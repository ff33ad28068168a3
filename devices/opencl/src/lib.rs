#![cfg(feature = "opencl")]

use common::{
    allocation_failed, argument_binding_failed, compilation_failed, context_creation_failed,
    enqueue_failed, entry_point_not_found, execution_failed, map_failed, platform_unavailable,
    profiling_unavailable, queue_creation_failed, unmap_failed, Access, KernelArg, MapMode,
    Profiling, Result,
};
use opencl3::{
    command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE},
    context::Context,
    device::{Device, CL_DEVICE_TYPE_ALL},
    error_codes::ClError,
    event::Event,
    kernel::Kernel,
    memory::{
        Buffer, ClMem, CL_MAP_READ, CL_MAP_WRITE, CL_MEM_ALLOC_HOST_PTR, CL_MEM_READ_ONLY,
        CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY,
    },
    platform::get_platforms,
    program::Program,
    types::{cl_uint, CL_BLOCKING},
};
use std::{
    ffi::c_void,
    ops::Range,
    ptr::{null, null_mut, NonNull},
};

/// 通过 OpenCL 驱动访问的加速器。
///
/// 字段顺序即析构顺序：队列先于上下文释放。
pub struct ClDevice {
    queue: CommandQueue,
    context: Context,
    device: Device,
}

pub struct ClBuffer {
    mem: Buffer<u8>,
    size: usize,
}

pub struct ClKernel {
    kernel: Kernel,
    arity: usize,
}

impl ClDevice {
    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    #[inline]
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }
}

impl common::Device for ClDevice {
    type Buffer = ClBuffer;
    type Program = Program;
    type Kernel = ClKernel;
    type Event = Event;

    fn open() -> Result<Self> {
        let platforms =
            get_platforms().map_err(|e| platform_unavailable(format!("clGetPlatformIDs: {e}")))?;
        let Some(platform) = platforms.first() else {
            return Err(platform_unavailable("no OpenCL platform found"));
        };
        let ids = platform
            .get_devices(CL_DEVICE_TYPE_ALL)
            .map_err(|e| platform_unavailable(format!("clGetDeviceIDs: {e}")))?;
        let Some(&id) = ids.first() else {
            return Err(platform_unavailable("no OpenCL device found"));
        };
        let device = Device::new(id);
        let context = Context::from_device(&device)
            .map_err(|e| context_creation_failed(format!("clCreateContext: {e}")))?;
        #[allow(deprecated)]
        let queue = CommandQueue::create_default(&context, CL_QUEUE_PROFILING_ENABLE)
            .map_err(|e| queue_creation_failed(format!("clCreateCommandQueue: {e}")))?;
        log::debug!(
            "opened OpenCL device \"{}\" on \"{}\"",
            device.name().unwrap_or_default(),
            platform.name().unwrap_or_default(),
        );
        Ok(Self {
            queue,
            context,
            device,
        })
    }

    #[inline]
    fn name(&self) -> String {
        self.device.name().unwrap_or_default()
    }

    fn extensions(&self) -> Result<String> {
        self.device
            .extensions()
            .map_err(|e| platform_unavailable(format!("CL_DEVICE_EXTENSIONS: {e}")))
    }

    fn build(&self, src: &str, options: &str) -> Result<Self::Program> {
        // 驱动返回的构建日志原样向上传递
        Program::create_and_build_from_source(&self.context, src, options).map_err(compilation_failed)
    }

    fn kernel(&self, program: &Self::Program, name: &str) -> Result<Self::Kernel> {
        let kernel = Kernel::create(program, name)
            .map_err(|e| entry_point_not_found(format!("clCreateKernel(\"{name}\"): {e}")))?;
        let arity = kernel.num_args().unwrap_or(0) as _;
        Ok(ClKernel { kernel, arity })
    }

    #[inline]
    fn arity(&self, kernel: &Self::Kernel) -> usize {
        kernel.arity
    }

    fn alloc(&self, size: usize, access: Access) -> Result<Self::Buffer> {
        let flags = match access {
            Access::ReadOnly => CL_MEM_READ_ONLY,
            Access::WriteOnly => CL_MEM_WRITE_ONLY,
            Access::ReadWrite => CL_MEM_READ_WRITE,
        };
        let mem = unsafe {
            Buffer::<u8>::create(&self.context, flags | CL_MEM_ALLOC_HOST_PTR, size, null_mut())
        }
        .map_err(|e| allocation_failed(0, format!("clCreateBuffer({size}): {e}")))?;
        Ok(ClBuffer { mem, size })
    }

    fn map(&self, buffer: &Self::Buffer, mode: MapMode, range: Range<usize>) -> Result<NonNull<u8>> {
        if range.start > range.end || range.end > buffer.size {
            return Err(map_failed(format!(
                "range {range:?} is outside the {}-byte buffer",
                buffer.size
            )));
        }
        let mut flags = 0;
        if mode.readable() {
            flags |= CL_MAP_READ
        }
        if mode.writable() {
            flags |= CL_MAP_WRITE
        }
        let mut ptr = null_mut::<c_void>();
        let event = unsafe {
            self.queue.enqueue_map_buffer(
                &buffer.mem,
                CL_BLOCKING,
                flags,
                range.start,
                range.len(),
                &mut ptr,
                &[],
            )
        }
        .map_err(|e| map_failed(format!("clEnqueueMapBuffer: {e}")))?;
        drop(event);
        NonNull::new(ptr.cast()).ok_or_else(|| map_failed("clEnqueueMapBuffer returned null"))
    }

    fn unmap(&self, buffer: &Self::Buffer, ptr: NonNull<u8>) -> Result<()> {
        let event = unsafe {
            self.queue
                .enqueue_unmap_mem_object(buffer.mem.get(), ptr.as_ptr().cast(), &[])
        }
        .map_err(|e| unmap_failed(format!("clEnqueueUnmapMemObject: {e}")))?;
        drop(event);
        Ok(())
    }

    fn set_arg(&self, kernel: &mut Self::Kernel, index: usize, arg: KernelArg<Self::Buffer>) -> Result<()> {
        let i = index as cl_uint;
        let ans = match arg {
            KernelArg::Buffer(b) => unsafe { kernel.kernel.set_arg(i, &b.mem.get()) },
            KernelArg::Local(size) => unsafe { kernel.kernel.set_arg_local_buffer(i, size) },
            KernelArg::Scalar(s) => {
                let bytes = s.bytes();
                match bytes.len() {
                    1 => set_bytes::<1>(&kernel.kernel, i, bytes),
                    2 => set_bytes::<2>(&kernel.kernel, i, bytes),
                    4 => set_bytes::<4>(&kernel.kernel, i, bytes),
                    8 => set_bytes::<8>(&kernel.kernel, i, bytes),
                    16 => set_bytes::<16>(&kernel.kernel, i, bytes),
                    n => {
                        return Err(argument_binding_failed(
                            index,
                            format!("unsupported {n}-byte scalar"),
                        ))
                    }
                }
            }
        };
        ans.map_err(|e| argument_binding_failed(index, format!("clSetKernelArg: {e}")))
    }

    fn enqueue(&self, kernel: &Self::Kernel, global: &[usize]) -> Result<Self::Event> {
        unsafe {
            self.queue.enqueue_nd_range_kernel(
                kernel.kernel.get(),
                global.len() as _,
                null(),
                global.as_ptr(),
                null(),
                &[],
            )
        }
        .map_err(|e| enqueue_failed(format!("clEnqueueNDRangeKernel: {e}")))
    }

    fn finish(&self) -> Result<()> {
        self.queue
            .finish()
            .map_err(|e| execution_failed(format!("clFinish: {e}")))
    }

    fn profiling(&self, event: &Self::Event) -> Result<Profiling> {
        let err = |e: ClError| profiling_unavailable(format!("clGetEventProfilingInfo: {e}"));
        Ok(Profiling {
            queued: event.profiling_command_queued().map_err(err)?,
            submit: event.profiling_command_submit().map_err(err)?,
            start: event.profiling_command_start().map_err(err)?,
            end: event.profiling_command_end().map_err(err)?,
        })
    }

    #[inline]
    fn release_kernel(&self, kernel: Self::Kernel) -> Result<()> {
        drop(kernel);
        Ok(())
    }

    #[inline]
    fn release_program(&self, program: Self::Program) -> Result<()> {
        drop(program);
        Ok(())
    }

    #[inline]
    fn release_buffer(&self, buffer: Self::Buffer) -> Result<()> {
        drop(buffer);
        Ok(())
    }

    #[inline]
    fn release_event(&self, event: Self::Event) -> Result<()> {
        drop(event);
        Ok(())
    }

    fn close(self) -> Result<()> {
        let Self {
            queue,
            context,
            device,
        } = self;
        let finished = queue.finish();
        drop(queue);
        drop(context);
        log::debug!("closed OpenCL device \"{}\"", device.name().unwrap_or_default());
        finished.map_err(|e| execution_failed(format!("clFinish: {e}")))
    }
}

fn set_bytes<const N: usize>(
    kernel: &Kernel,
    index: cl_uint,
    bytes: &[u8],
) -> std::result::Result<(), ClError> {
    let mut value = [0u8; N];
    value.copy_from_slice(bytes);
    unsafe { kernel.set_arg(index, &value) }
}
