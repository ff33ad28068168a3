use digit_layout::{types as ty, DigitLayout};
use std::fmt;

/// kernel 视角下缓冲区的访问方向，与 `CL_MEM_*_ONLY` 标志一一对应。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Access {
    /// kernel 只读，通常由主机写入输入数据。
    ReadOnly,
    /// kernel 只写，通常由主机读回结果。
    WriteOnly,
    ReadWrite,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MapMode {
    Read,
    Write,
    ReadWrite,
}

impl MapMode {
    #[inline]
    pub const fn readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    #[inline]
    pub const fn writable(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

const SCALAR_CAPACITY: usize = 16;

/// 按值传递给 kernel 的定宽标量（或不超过 16 字节的短向量）。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Scalar {
    ty: DigitLayout,
    lanes: u8,
    len: u8,
    data: [u8; SCALAR_CAPACITY],
}

impl Scalar {
    /// 从原始字节构造，`bytes` 的长度必须等于 `ty` 的宽度乘以通道数。
    ///
    /// `ty` 没有确定宽度时返回 `None`。
    pub fn from_lanes(ty: DigitLayout, lanes: usize, bytes: &[u8]) -> Option<Self> {
        let unit = ty.nbytes()?;
        if lanes == 0 || bytes.len() != unit * lanes || bytes.len() > SCALAR_CAPACITY {
            return None;
        }
        let mut data = [0; SCALAR_CAPACITY];
        data[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            ty,
            lanes: lanes as _,
            len: bytes.len() as _,
            data,
        })
    }

    #[inline]
    pub const fn ty(&self) -> DigitLayout {
        self.ty
    }

    #[inline]
    pub const fn lanes(&self) -> usize {
        self.lanes as _
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}{:?}", self.ty, self.lanes, self.bytes())
    }
}

macro_rules! scalar_from {
    ($($rust:ty => $layout:expr;)+) => {
        $(
            impl From<$rust> for Scalar {
                #[inline]
                fn from(value: $rust) -> Self {
                    let mut data = [0; SCALAR_CAPACITY];
                    let bytes = value.to_ne_bytes();
                    data[..bytes.len()].copy_from_slice(&bytes);
                    Self {
                        ty: $layout,
                        lanes: 1,
                        len: bytes.len() as _,
                        data,
                    }
                }
            }
        )+
    };
}

scalar_from! {
    i8  => ty::I8 ;
    u8  => ty::U8 ;
    i16 => ty::I16;
    u16 => ty::U16;
    i32 => ty::I32;
    u32 => ty::U32;
    i64 => ty::I64;
    u64 => ty::U64;
    f32 => ty::F32;
    f64 => ty::F64;
}

/// 后端层面的 kernel 实参。
pub enum KernelArg<'a, B> {
    Buffer(&'a B),
    Scalar(Scalar),
    /// `__local` 参数，只给出字节数。
    Local(usize),
}
