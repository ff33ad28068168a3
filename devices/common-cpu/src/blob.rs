use std::{
    alloc::{alloc_zeroed, dealloc, Layout},
    ptr::{copy_nonoverlapping, NonNull},
};

/// 零初始化的主机内存块，模拟设备缓冲区的后备存储。
///
/// 内容只能通过带边界检查的拷贝访问，不提供切片视图。
/// 主机映射期间，调用方直接持有 [`Blob::as_ptr`] 给出的指针。
pub struct Blob {
    ptr: NonNull<u8>,
    len: usize,
}

impl Blob {
    /// 分配 `size` 字节，`size` 为 0 或分配失败时返回 `None`。
    pub fn zeroed(size: usize) -> Option<Self> {
        if size == 0 {
            return None;
        }
        let layout = Layout::from_size_align(size, align_of::<u128>()).ok()?;
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) })?;
        Some(Self { ptr, len: size })
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// 从 `offset` 处读出 `dst.len()` 字节，越界时返回 `false`。
    pub fn read(&self, offset: usize, dst: &mut [u8]) -> bool {
        match offset.checked_add(dst.len()) {
            Some(end) if end <= self.len => {
                unsafe { copy_nonoverlapping(self.ptr.as_ptr().add(offset), dst.as_mut_ptr(), dst.len()) };
                true
            }
            _ => false,
        }
    }

    /// 向 `offset` 处写入 `src`，越界时返回 `false`。
    pub fn write(&self, offset: usize, src: &[u8]) -> bool {
        match offset.checked_add(src.len()) {
            Some(end) if end <= self.len => {
                unsafe { copy_nonoverlapping(src.as_ptr(), self.ptr.as_ptr().add(offset), src.len()) };
                true
            }
            _ => false,
        }
    }
}

impl Drop for Blob {
    #[inline]
    fn drop(&mut self) {
        let &mut Blob { ptr, len } = self;
        unsafe { dealloc(ptr.as_ptr(), layout(len)) }
    }
}

#[inline(always)]
const fn layout(size: usize) -> Layout {
    unsafe { Layout::from_size_align_unchecked(size, align_of::<u128>()) }
}

#[cfg(test)]
mod test {
    use super::Blob;

    #[test]
    fn test_zeroed() {
        assert!(Blob::zeroed(0).is_none());

        let blob = Blob::zeroed(16).unwrap();
        assert_eq!(blob.len(), 16);
        let mut buf = [0xffu8; 16];
        assert!(blob.read(0, &mut buf));
        assert_eq!(buf, [0; 16]);
    }

    #[test]
    fn test_bounds() {
        let blob = Blob::zeroed(8).unwrap();
        assert!(blob.write(4, &[1, 2, 3, 4]));
        assert!(!blob.write(5, &[1, 2, 3, 4]));
        assert!(!blob.write(usize::MAX, &[1]));

        let mut buf = [0u8; 2];
        assert!(blob.read(5, &mut buf));
        assert_eq!(buf, [2, 3]);
        assert!(!blob.read(7, &mut buf));
    }
}
