//! 在主机上模拟的加速器：顺序队列、零初始化缓冲区与阻塞映射，kernel 由主机函数实现。

mod blob;
mod census;
mod config;
mod kernels;
mod library;
mod memory;
mod queue;

pub use census::{Census, Live};
pub use config::{HostConfig, HostDevice, HostPlatform};
pub use library::{Args, Fault, Library, NativeKernel, WorkItem};

use census::{Object, Tracked};
use common::{
    compilation_failed, context_creation_failed, enqueue_failed, entry_point_not_found,
    execution_failed, map_failed, parse_signatures, platform_unavailable, profiling_unavailable,
    queue_creation_failed, unmap_failed, Access, KernelArg, MapMode, Profiling, Result,
};
use library::Value;
use memory::{Pool, Storage};
use queue::{EventState, Queue, Status};
use std::{ops::Range, ptr::NonNull, rc::Rc};

pub struct Cpu {
    name: String,
    extensions: String,
    library: Library,
    pool: Rc<Pool>,
    queue: Queue,
    census: Census,
    queue_token: Tracked,
    context_token: Tracked,
}

pub struct CpuBuffer(Rc<Storage>);

pub struct CpuProgram {
    kernels: Vec<NativeKernel>,
    _tracked: Tracked,
}

pub struct CpuKernel {
    native: NativeKernel,
    slots: Vec<Option<Slot>>,
    _tracked: Tracked,
}

#[derive(Clone)]
enum Slot {
    Value(Value),
    Local(usize),
}

pub struct CpuEvent {
    state: Rc<EventState>,
    _tracked: Tracked,
}

impl Cpu {
    /// 按给定配置打开第一个平台的第一个设备。
    pub fn with_config(config: HostConfig) -> Result<Self> {
        let HostConfig { platforms, library } = config;
        let Some(platform) = platforms.into_iter().next() else {
            return Err(platform_unavailable("no host platform configured"));
        };
        let Some(device) = platform.devices.into_iter().next() else {
            return Err(platform_unavailable(format!(
                "platform \"{}\" has no device",
                platform.name
            )));
        };
        if !device.available {
            return Err(context_creation_failed(format!(
                "device \"{}\" is not available",
                device.name
            )));
        }
        let census = Census::default();
        let context_token = census.track(Object::Context);
        if !device.profiling {
            return Err(queue_creation_failed(format!(
                "device \"{}\" does not support profiling queues",
                device.name
            )));
        }
        let queue_token = census.track(Object::Queue);
        log::debug!("opened host device \"{}\" on \"{}\"", device.name, platform.name);
        Ok(Self {
            name: device.name,
            extensions: device.extensions,
            library,
            pool: Pool::new(device.memory),
            queue: Queue::new(),
            census,
            queue_token,
            context_token,
        })
    }

    /// 存活对象计数器，设备关闭后仍然有效。
    #[inline]
    pub fn census(&self) -> Census {
        self.census.clone()
    }

    fn flush(&self) -> Result<()> {
        self.queue.flush().map_err(execution_failed)
    }
}

impl common::Device for Cpu {
    type Buffer = CpuBuffer;
    type Program = CpuProgram;
    type Kernel = CpuKernel;
    type Event = CpuEvent;

    #[inline]
    fn open() -> Result<Self> {
        Self::with_config(HostConfig::default())
    }

    #[inline]
    fn name(&self) -> String {
        self.name.clone()
    }

    #[inline]
    fn extensions(&self) -> Result<String> {
        Ok(self.extensions.clone())
    }

    fn build(&self, src: &str, options: &str) -> Result<Self::Program> {
        let mut log = Vec::new();
        check_options(options, &mut log);

        let mut kernels = Vec::new();
        match parse_signatures(src) {
            Ok(signatures) => {
                for sig in signatures {
                    match self.library.get(&sig.name) {
                        Some(native) if native.arity == sig.arity() => kernels.push(*native),
                        Some(native) => log.push(format!(
                            "<source>:{}: error: kernel `{}` declares {} parameters, device implementation takes {}",
                            sig.line,
                            sig.name,
                            sig.arity(),
                            native.arity,
                        )),
                        None => log.push(format!(
                            "<source>:{}: error: kernel `{}` is not supported by {}",
                            sig.line, sig.name, self.name,
                        )),
                    }
                }
            }
            Err(e) => log.push(format!("<source>:{e}")),
        }

        if !log.is_empty() {
            log.push(format!("{} error(s) generated.", log.len()));
            return Err(compilation_failed(log.join("\n")));
        }
        log::debug!("built host program with {} kernel(s)", kernels.len());
        Ok(CpuProgram {
            kernels,
            _tracked: self.census.track(Object::Program),
        })
    }

    fn kernel(&self, program: &Self::Program, name: &str) -> Result<Self::Kernel> {
        let Some(native) = program.kernels.iter().find(|k| k.name == name) else {
            return Err(entry_point_not_found(format!(
                "no kernel named \"{name}\" in program"
            )));
        };
        Ok(CpuKernel {
            native: *native,
            slots: vec![None; native.arity],
            _tracked: self.census.track(Object::Kernel),
        })
    }

    #[inline]
    fn arity(&self, kernel: &Self::Kernel) -> usize {
        kernel.native.arity
    }

    fn alloc(&self, size: usize, access: Access) -> Result<Self::Buffer> {
        Storage::alloc(&self.pool, &self.census, size, access).map(CpuBuffer)
    }

    fn map(&self, buffer: &Self::Buffer, mode: MapMode, range: Range<usize>) -> Result<NonNull<u8>> {
        self.flush()?;

        let storage = &buffer.0;
        let len = storage.blob().len();
        if storage.is_mapped() {
            return Err(map_failed("buffer is already mapped"));
        }
        if range.start > range.end || range.end > len {
            return Err(map_failed(format!(
                "range {range:?} ({mode:?}) is outside the {len}-byte buffer"
            )));
        }
        storage.set_mapped(true);
        Ok(unsafe { storage.blob().as_ptr().add(range.start) })
    }

    fn unmap(&self, buffer: &Self::Buffer, ptr: NonNull<u8>) -> Result<()> {
        let storage = &buffer.0;
        if !storage.is_mapped() {
            return Err(unmap_failed("buffer is not mapped"));
        }
        let base = storage.blob().as_ptr().as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        if !(base..=base + storage.blob().len()).contains(&addr) {
            return Err(unmap_failed("pointer does not belong to the buffer"));
        }
        storage.set_mapped(false);
        Ok(())
    }

    fn set_arg(&self, kernel: &mut Self::Kernel, index: usize, arg: KernelArg<Self::Buffer>) -> Result<()> {
        let Some(slot) = kernel.slots.get_mut(index) else {
            return Err(common::argument_binding_failed(
                index,
                format!("kernel \"{}\" takes {} arguments", kernel.native.name, kernel.native.arity),
            ));
        };
        *slot = Some(match arg {
            KernelArg::Buffer(b) => Slot::Value(Value::Mem(b.0.clone())),
            KernelArg::Scalar(s) => Slot::Value(Value::Scalar(s)),
            KernelArg::Local(size) => Slot::Local(size),
        });
        Ok(())
    }

    fn enqueue(&self, kernel: &Self::Kernel, global: &[usize]) -> Result<Self::Event> {
        let mut dims = [1; 3];
        match global {
            [_, ..] if global.len() <= 3 && global.iter().all(|&d| d > 0) => {
                dims[..global.len()].copy_from_slice(global)
            }
            _ => return Err(enqueue_failed(format!("invalid global size {global:?}"))),
        }

        let mut args = Vec::with_capacity(kernel.slots.len());
        for (i, slot) in kernel.slots.iter().enumerate() {
            args.push(match slot {
                Some(Slot::Value(Value::Mem(m))) if m.is_mapped() => {
                    return Err(enqueue_failed(format!("argument #{i} is mapped by the host")))
                }
                Some(Slot::Value(v)) => v.clone(),
                Some(Slot::Local(size)) => match Storage::scratch(*size) {
                    Some(m) => Value::Mem(m),
                    None => {
                        return Err(enqueue_failed(format!(
                            "invalid local memory size {size} for argument #{i}"
                        )))
                    }
                },
                None => return Err(enqueue_failed(format!("argument #{i} is not set"))),
            })
        }

        let state = self.queue.push(kernel.native, args, dims);
        Ok(CpuEvent {
            state,
            _tracked: self.census.track(Object::Event),
        })
    }

    #[inline]
    fn finish(&self) -> Result<()> {
        self.flush()
    }

    fn profiling(&self, event: &Self::Event) -> Result<Profiling> {
        match event.state.status() {
            Status::Complete => Ok(event.state.times()),
            Status::Queued => Err(profiling_unavailable("command has not completed")),
            Status::Failed => Err(profiling_unavailable("command failed")),
        }
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

    fn release_buffer(&self, buffer: Self::Buffer) -> Result<()> {
        if buffer.0.is_mapped() {
            log::warn!("releasing a buffer that is still mapped");
        }
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
            name,
            queue,
            queue_token,
            context_token,
            ..
        } = self;
        // 释放队列前隐式完成所有已提交的命令
        let flushed = queue.flush().map_err(execution_failed);
        drop((queue, queue_token));
        drop(context_token);
        log::debug!("closed host device \"{name}\"");
        flushed
    }
}

fn check_options(options: &str, log: &mut Vec<String>) {
    let mut words = options.split_whitespace();
    while let Some(word) = words.next() {
        match word {
            "-D" | "-I" => {
                if words.next().is_none() {
                    log.push(format!("error: argument to '{word}' is missing"))
                }
            }
            w if w.starts_with("-D") || w.starts_with("-I") || w.starts_with("-cl-") => {}
            "-w" | "-Werror" => {}
            w => log.push(format!("error: unknown build option '{w}'")),
        }
    }
}
