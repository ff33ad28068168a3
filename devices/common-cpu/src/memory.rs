use crate::{
    blob::Blob,
    census::{Census, Object, Tracked},
};
use common::{allocation_failed, Access, DispatchError};
use std::{cell::Cell, rc::Rc};

/// 设备存储容量。
pub(crate) struct Pool {
    capacity: usize,
    used: Cell<usize>,
}

impl Pool {
    pub fn new(capacity: usize) -> Rc<Self> {
        Rc::new(Self {
            capacity,
            used: Cell::new(0),
        })
    }

    #[inline]
    pub fn free(&self) -> usize {
        self.capacity - self.used.get()
    }
}

/// 一块设备存储区域。kernel 参数槽与缓冲区句柄共享它。
pub(crate) struct Storage {
    blob: Blob,
    access: Access,
    mapped: Cell<bool>,
    pool: Option<Rc<Pool>>,
    _tracked: Option<Tracked>,
}

impl Storage {
    pub fn alloc(
        pool: &Rc<Pool>,
        census: &Census,
        size: usize,
        access: Access,
    ) -> Result<Rc<Self>, DispatchError> {
        if size == 0 {
            return Err(allocation_failed(0, "buffer size must be positive"));
        }
        if size > pool.free() {
            return Err(allocation_failed(
                0,
                format!("out of device memory: {size} bytes requested, {} bytes free", pool.free()),
            ));
        }
        let Some(blob) = Blob::zeroed(size) else {
            return Err(allocation_failed(0, format!("host allocation of {size} bytes failed")));
        };
        pool.used.set(pool.used.get() + size);
        Ok(Rc::new(Self {
            blob,
            access,
            mapped: Cell::new(false),
            pool: Some(pool.clone()),
            _tracked: Some(census.track(Object::Buffer)),
        }))
    }

    /// `__local` 参数使用的临时存储，不计入容量。
    pub fn scratch(size: usize) -> Option<Rc<Self>> {
        Blob::zeroed(size).map(|blob| {
            Rc::new(Self {
                blob,
                access: Access::ReadWrite,
                mapped: Cell::new(false),
                pool: None,
                _tracked: None,
            })
        })
    }

    #[inline]
    pub fn blob(&self) -> &Blob {
        &self.blob
    }

    #[inline]
    pub fn access(&self) -> Access {
        self.access
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.mapped.get()
    }

    #[inline]
    pub fn set_mapped(&self, mapped: bool) {
        self.mapped.set(mapped)
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if let Some(pool) = &self.pool {
            pool.used.set(pool.used.get() - self.blob.len())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::ErrorKind;

    #[test]
    fn test_capacity() {
        let pool = Pool::new(64);
        let census = Census::default();

        let a = Storage::alloc(&pool, &census, 48, Access::ReadOnly).unwrap();
        assert_eq!(pool.free(), 16);

        let e = Storage::alloc(&pool, &census, 32, Access::ReadOnly).err().unwrap();
        assert_eq!(e.kind, ErrorKind::AllocationFailed { index: 0 });
        let e = Storage::alloc(&pool, &census, 0, Access::ReadOnly).err().unwrap();
        assert_eq!(e.kind, ErrorKind::AllocationFailed { index: 0 });

        drop(a);
        assert_eq!(pool.free(), 64);
        assert_eq!(census.live().buffers, 0);
    }
}
