use crate::{BufferId, Session, WorkGeometry};
use common::{
    argument_binding_failed, enqueue_failed, execution_failed, profiling_unavailable,
    AddressSpace, Device, KernelArg, ParamKind, Profiling, Result, Scalar, Signature,
};

/// 会话中某个 kernel 的编号。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct KernelId(pub(crate) usize);

/// 绑定到 kernel 参数槽的值。
#[derive(Clone, Copy, Debug)]
pub enum Arg {
    Buffer(BufferId),
    Scalar(Scalar),
    /// `__local` 参数的字节数。
    Local(usize),
}

impl From<BufferId> for Arg {
    #[inline]
    fn from(value: BufferId) -> Self {
        Self::Buffer(value)
    }
}

impl From<Scalar> for Arg {
    #[inline]
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! arg_from_number {
    ($($ty:ty)+) => {
        $(
            impl From<$ty> for Arg {
                #[inline]
                fn from(value: $ty) -> Self {
                    Self::Scalar(value.into())
                }
            }
        )+
    };
}

arg_from_number!(i8 u8 i16 u16 i32 u32 i64 u64 f32 f64);

pub(crate) struct KernelEntry<D: Device> {
    pub kernel: D::Kernel,
    pub signature: Signature,
    bound: Vec<Option<Arg>>,
}

impl<D: Device> KernelEntry<D> {
    pub fn new(kernel: D::Kernel, signature: Signature) -> Self {
        Self {
            kernel,
            bound: vec![None; signature.arity()],
            signature,
        }
    }
}

/// 一次入队的完成句柄。
pub struct Event<D: Device> {
    inner: D::Event,
    seq: u64,
}

impl<D: Device> Session<D> {
    /// 将 `value` 绑定到 kernel 的第 `index` 个参数，覆盖之前的值。
    ///
    /// 绑定按声明的签名检查：下标必须存在，缓冲区只能绑定到指针参数，
    /// 标量的字节数必须与参数类型一致。
    pub fn bind_argument(&mut self, kernel: KernelId, index: usize, value: impl Into<Arg>) -> Result<()> {
        let value = value.into();
        let err = |info: String| argument_binding_failed(index, info);

        let Some(device) = self.device.as_ref() else {
            return Err(err("session has been released".into()));
        };
        let Some(Some(entry)) = self.kernels.get_mut(kernel.0) else {
            return Err(err(format!("{kernel:?} does not exist")));
        };
        let sig = &entry.signature;
        let Some(param) = sig.params.get(index) else {
            return Err(err(format!(
                "kernel \"{}\" takes {} arguments",
                sig.name,
                sig.arity()
            )));
        };

        let arg = match (param.kind, value) {
            (ParamKind::Pointer { space: AddressSpace::Local, .. }, Arg::Local(size))
            | (ParamKind::Opaque, Arg::Local(size)) => {
                if size == 0 {
                    return Err(err("local memory size must be positive".into()));
                }
                KernelArg::Local(size)
            }
            (ParamKind::Pointer { space: AddressSpace::Local, .. }, _) => {
                return Err(err(format!(
                    "`{}` is a local memory parameter, only a size can be bound",
                    param.name
                )))
            }
            (ParamKind::Pointer { .. } | ParamKind::Opaque, Arg::Buffer(id)) => {
                match self.buffers.get(id.0).and_then(Option::as_ref) {
                    Some(b) => KernelArg::Buffer(&b.buffer),
                    None => return Err(err(format!("{id:?} does not exist"))),
                }
            }
            (ParamKind::Pointer { .. }, _) => {
                return Err(err(format!("`{}` is a pointer, a buffer is required", param.name)))
            }
            (ParamKind::Value { .. }, Arg::Scalar(s)) => {
                let Some(expected) = param.kind.value_size() else {
                    return Err(err(format!("`{}` has no fixed size", param.name)));
                };
                if s.bytes().len() != expected {
                    return Err(err(format!(
                        "`{}` takes {expected} bytes, {} given",
                        param.name,
                        s.bytes().len()
                    )));
                }
                KernelArg::Scalar(s)
            }
            (ParamKind::Value { .. }, _) => {
                return Err(err(format!("`{}` is passed by value, a scalar is required", param.name)))
            }
            (ParamKind::Opaque, Arg::Scalar(s)) => KernelArg::Scalar(s),
        };

        device
            .set_arg(&mut entry.kernel, index, arg)
            .map_err(|e| e.at_index(index))?;
        entry.bound[index] = Some(value);
        Ok(())
    }

    /// 以 `geometry` 为全局尺寸入队 kernel，局部尺寸交给运行时决定。
    ///
    /// 所有参数都必须已绑定，且引用的缓冲区都不在映射中。
    pub fn enqueue(&mut self, kernel: KernelId, geometry: &WorkGeometry) -> Result<Event<D>> {
        let Some(device) = self.device.as_ref() else {
            return Err(enqueue_failed("session has been released"));
        };
        let Some(Some(entry)) = self.kernels.get(kernel.0) else {
            return Err(enqueue_failed(format!("{kernel:?} does not exist")));
        };
        for (i, arg) in entry.bound.iter().enumerate() {
            match arg {
                None => {
                    return Err(enqueue_failed(format!(
                        "argument #{i} of kernel \"{}\" is not bound",
                        entry.signature.name
                    )))
                }
                Some(Arg::Buffer(id)) if self.buffer(*id).is_some_and(|b| b.mapped.get()) => {
                    return Err(enqueue_failed(format!(
                        "argument #{i} of kernel \"{}\" refers to mapped {id:?}",
                        entry.signature.name
                    )))
                }
                Some(_) => {}
            }
        }

        let inner = device.enqueue(&entry.kernel, geometry.global())?;
        log::debug!(
            "enqueued \"{}\" over {:?}",
            entry.signature.name,
            geometry.global()
        );
        self.submitted += 1;
        Ok(Event {
            inner,
            seq: self.submitted,
        })
    }

    /// 等待队列中所有命令完成。
    pub fn wait(&self, event: &Event<D>) -> Result<()> {
        let Some(device) = self.device.as_ref() else {
            return Err(execution_failed("session has been released"));
        };
        device.finish()?;
        self.completed.set(self.submitted.max(event.seq));
        Ok(())
    }

    /// 读取已完成命令的设备时间戳，只能在 [`Session::wait`] 成功之后调用。
    pub fn read_profiling(&self, event: &Event<D>) -> Result<Profiling> {
        if event.seq > self.completed.get() {
            return Err(profiling_unavailable(
                "the command has not been waited for",
            ));
        }
        let Some(device) = self.device.as_ref() else {
            return Err(profiling_unavailable("session has been released"));
        };
        device.profiling(&event.inner)
    }

    /// 归还完成句柄。
    pub fn release_event(&self, event: Event<D>) -> Result<()> {
        match self.device.as_ref() {
            Some(device) => device.release_event(event.inner),
            None => {
                drop(event);
                Ok(())
            }
        }
    }
}
