use crate::memory::Storage;
use bytemuck::Pod;
use common::{Access, Scalar};
use std::{fmt, mem::size_of, rc::Rc};

/// 在主机上执行的 kernel 实现。
///
/// 程序构建时按名字把源码中声明的入口函数与这里的实现对应起来。
#[derive(Clone, Copy)]
pub struct NativeKernel {
    pub name: &'static str,
    pub arity: usize,
    pub run: fn(&WorkItem, &Args) -> Result<(), Fault>,
}

impl fmt::Debug for NativeKernel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// 模拟设备能够“编译”的 kernel 集合。
#[derive(Clone, Default, Debug)]
pub struct Library(Vec<NativeKernel>);

impl Library {
    /// 不含任何实现的空库，所有构建都会失败。
    #[inline]
    pub fn empty() -> Self {
        Self(vec![])
    }

    pub fn builtin() -> Self {
        Self(crate::kernels::BUILTIN.to_vec())
    }

    /// 加入一个实现，同名实现将被替换。
    pub fn with(mut self, kernel: NativeKernel) -> Self {
        self.0.retain(|k| k.name != kernel.name);
        self.0.push(kernel);
        self
    }

    pub fn get(&self, name: &str) -> Option<&NativeKernel> {
        self.0.iter().find(|k| k.name == name)
    }
}

/// 正在执行的工作项。
#[derive(Clone, Copy, Debug)]
pub struct WorkItem {
    pub(crate) id: [usize; 3],
    pub(crate) size: [usize; 3],
}

impl WorkItem {
    /// 对应 `get_global_id`，超出维数时为 0。
    #[inline]
    pub fn global_id(&self, dim: usize) -> usize {
        self.id.get(dim).copied().unwrap_or(0)
    }

    /// 对应 `get_global_size`，超出维数时为 1。
    #[inline]
    pub fn global_size(&self, dim: usize) -> usize {
        self.size.get(dim).copied().unwrap_or(1)
    }
}

/// 设备端故障，例如越界访问。
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Fault(pub String);

impl fmt::Display for Fault {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
pub(crate) enum Value {
    Mem(Rc<Storage>),
    Scalar(Scalar),
}

/// kernel 执行时看到的实参表。所有访问都带边界检查。
pub struct Args<'a>(pub(crate) &'a [Value]);

impl Args<'_> {
    fn mem(&self, slot: usize) -> Result<&Storage, Fault> {
        match self.0.get(slot) {
            Some(Value::Mem(storage)) => Ok(storage),
            Some(Value::Scalar(_)) => Err(Fault(format!("argument #{slot} is not a buffer"))),
            None => Err(Fault(format!("argument #{slot} does not exist"))),
        }
    }

    /// 缓冲区按 `T` 计的元素个数。
    pub fn len<T>(&self, slot: usize) -> Result<usize, Fault> {
        Ok(self.mem(slot)?.blob().len() / size_of::<T>())
    }

    pub fn read<T: Pod>(&self, slot: usize, index: usize) -> Result<T, Fault> {
        let mut value = T::zeroed();
        let ok = match index.checked_mul(size_of::<T>()) {
            Some(offset) => self
                .mem(slot)?
                .blob()
                .read(offset, bytemuck::bytes_of_mut(&mut value)),
            None => false,
        };
        if ok {
            Ok(value)
        } else {
            Err(out_of_bounds::<T>("read", slot, index))
        }
    }

    pub fn write<T: Pod>(&self, slot: usize, index: usize, value: T) -> Result<(), Fault> {
        let mem = self.mem(slot)?;
        if mem.access() == Access::ReadOnly {
            return Err(Fault(format!("write to read-only buffer #{slot}")));
        }
        let ok = match index.checked_mul(size_of::<T>()) {
            Some(offset) => mem.blob().write(offset, bytemuck::bytes_of(&value)),
            None => false,
        };
        if ok {
            Ok(())
        } else {
            Err(out_of_bounds::<T>("write", slot, index))
        }
    }

    /// 读-改-写。工作项串行执行，所以这就是原子操作的语义。
    pub fn update<T: Pod>(
        &self,
        slot: usize,
        index: usize,
        f: impl FnOnce(T) -> T,
    ) -> Result<T, Fault> {
        let old = self.read::<T>(slot, index)?;
        self.write(slot, index, f(old))?;
        Ok(old)
    }

    pub fn scalar<T: Pod>(&self, slot: usize) -> Result<T, Fault> {
        match self.0.get(slot) {
            Some(Value::Scalar(s)) if s.bytes().len() == size_of::<T>() => {
                Ok(bytemuck::pod_read_unaligned(s.bytes()))
            }
            Some(Value::Scalar(s)) => Err(Fault(format!(
                "argument #{slot} holds {} bytes, {} expected",
                s.bytes().len(),
                size_of::<T>(),
            ))),
            Some(Value::Mem(_)) => Err(Fault(format!("argument #{slot} is not a scalar"))),
            None => Err(Fault(format!("argument #{slot} does not exist"))),
        }
    }
}

fn out_of_bounds<T>(op: &str, slot: usize, index: usize) -> Fault {
    Fault(format!(
        "out-of-bounds {op} of {} bytes at element {index} of argument #{slot}",
        size_of::<T>(),
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{census::Census, memory::Pool};

    fn args(access: Access) -> Vec<Value> {
        let pool = Pool::new(1 << 10);
        let census = Census::default();
        vec![
            Value::Mem(Storage::alloc(&pool, &census, 16, access).unwrap()),
            Value::Scalar(Scalar::from(7u32)),
        ]
    }

    #[test]
    fn test_access() {
        let values = args(Access::ReadWrite);
        let args = Args(&values);
        assert_eq!(args.len::<u32>(0), Ok(4));
        args.write(0, 3, 42u32).unwrap();
        assert_eq!(args.read::<u32>(0, 3), Ok(42));
        assert_eq!(args.update(0, 3, |x: u32| x + 1), Ok(42));
        assert_eq!(args.read::<u32>(0, 3), Ok(43));
        assert_eq!(args.scalar::<u32>(1), Ok(7));
    }

    #[test]
    fn test_faults() {
        let values = args(Access::ReadOnly);
        let args = Args(&values);
        assert!(args.read::<u32>(0, 4).is_err());
        assert!(args.read::<u32>(0, usize::MAX).is_err());
        assert!(args.write(0, 0, 1u32).is_err());
        assert!(args.scalar::<u64>(1).is_err());
        assert!(args.scalar::<u32>(0).is_err());
        assert!(args.read::<u32>(2, 0).is_err());
    }

    #[test]
    fn test_library() {
        let lib = Library::builtin();
        assert_eq!(lib.get("sobel").map(|k| k.arity), Some(4));
        assert!(Library::empty().get("sobel").is_none());

        fn nop(_: &WorkItem, _: &Args) -> Result<(), Fault> {
            Ok(())
        }
        let lib = lib.with(NativeKernel {
            name: "sobel",
            arity: 0,
            run: nop,
        });
        assert_eq!(lib.get("sobel").map(|k| k.arity), Some(0));
    }
}
