//! 随设备提供的 kernel 实现，与 `samples/assets` 中同名的 OpenCL C 源码语义一致。

use crate::library::{Args, Fault, NativeKernel, WorkItem};

pub(crate) const BUILTIN: [NativeKernel; 8] = [
    NativeKernel {
        name: "hello_world_opencl",
        arity: 3,
        run: hello_world_opencl,
    },
    NativeKernel {
        name: "identity",
        arity: 2,
        run: identity,
    },
    NativeKernel {
        name: "sobel",
        arity: 4,
        run: sobel,
    },
    NativeKernel {
        name: "fir_float",
        arity: 3,
        run: fir_float,
    },
    NativeKernel {
        name: "mandelbrot",
        arity: 3,
        run: mandelbrot,
    },
    NativeKernel {
        name: "sgemm",
        arity: 6,
        run: sgemm,
    },
    NativeKernel {
        name: "long_vectors",
        arity: 3,
        run: long_vectors,
    },
    NativeKernel {
        name: "template",
        arity: 0,
        run: template,
    },
];

fn hello_world_opencl(item: &WorkItem, args: &Args) -> Result<(), Fault> {
    let i = item.global_id(0);
    let a = args.read::<i32>(0, i)?;
    let b = args.read::<i32>(1, i)?;
    args.write(2, i, a.wrapping_add(b))
}

fn identity(item: &WorkItem, args: &Args) -> Result<(), Fault> {
    let i = item.global_id(0);
    args.write(1, i, args.read::<u32>(0, i)?)
}

/// 按边缘钳位读取二维图像中的一个像素。
struct Clamped<'a, 'b> {
    args: &'a Args<'b>,
    slot: usize,
    width: usize,
    height: usize,
}

impl Clamped<'_, '_> {
    fn get<T: bytemuck::Pod>(&self, x: isize, y: isize) -> Result<T, Fault> {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.args.read(self.slot, y * self.width + x)
    }
}

fn width_of(args: &Args, slot: usize) -> Result<usize, Fault> {
    match args.scalar::<i32>(slot)? {
        w if w > 0 => Ok(w as _),
        w => Err(Fault(format!("invalid width {w}"))),
    }
}

fn sobel(item: &WorkItem, args: &Args) -> Result<(), Fault> {
    const PIXELS: usize = 16;

    let width = width_of(args, 1)?;
    let image = Clamped {
        args,
        slot: 0,
        width,
        height: item.global_size(1),
    };
    let y = item.global_id(1);
    for x in item.global_id(0) * PIXELS..(item.global_id(0) + 1) * PIXELS {
        let p = |dx: isize, dy: isize| -> Result<i32, Fault> {
            image.get::<u8>(x as isize + dx, y as isize + dy).map(i32::from)
        };
        let gx = (p(1, -1)? + 2 * p(1, 0)? + p(1, 1)?) - (p(-1, -1)? + 2 * p(-1, 0)? + p(-1, 1)?);
        let gy = (p(-1, 1)? + 2 * p(0, 1)? + p(1, 1)?) - (p(-1, -1)? + 2 * p(0, -1)? + p(1, -1)?);
        let i = y * width + x;
        args.write(2, i, (gx >> 3) as i8)?;
        args.write(3, i, (gy >> 3) as i8)?;
    }
    Ok(())
}

fn fir_float(item: &WorkItem, args: &Args) -> Result<(), Fault> {
    const PIXELS: usize = 4;
    const WEIGHTS: [[f32; 3]; 3] = [[1., 2., 1.], [2., 4., 2.], [1., 2., 1.]];

    let width = width_of(args, 2)?;
    let image = Clamped {
        args,
        slot: 0,
        width,
        height: item.global_size(1),
    };
    let y = item.global_id(1);
    for x in item.global_id(0) * PIXELS..(item.global_id(0) + 1) * PIXELS {
        let mut sum = 0.;
        for (dy, row) in WEIGHTS.iter().enumerate() {
            for (dx, w) in row.iter().enumerate() {
                let v = image.get::<f32>(x as isize + dx as isize - 1, y as isize + dy as isize - 1)?;
                sum += w * v;
            }
        }
        args.write(1, y * width + x, sum / 16.)?;
    }
    Ok(())
}

fn mandelbrot(item: &WorkItem, args: &Args) -> Result<(), Fault> {
    const PIXELS: usize = 4;
    const MAX_ITERATIONS: u32 = 64;

    let width = width_of(args, 1)?;
    let height = width_of(args, 2)?;
    let y = item.global_id(1);
    let ci = -1.5 + 3. * y as f32 / height as f32;
    for x in item.global_id(0) * PIXELS..(item.global_id(0) + 1) * PIXELS {
        let cr = -2. + 3. * x as f32 / width as f32;
        let (mut zr, mut zi) = (0f32, 0f32);
        let mut iterations = 0;
        while iterations < MAX_ITERATIONS && zr * zr + zi * zi <= 4. {
            (zr, zi) = (zr * zr - zi * zi + cr, 2. * zr * zi + ci);
            iterations += 1;
        }
        args.write(0, y * width + x, (iterations * 255 / MAX_ITERATIONS) as u8)?;
    }
    Ok(())
}

fn sgemm(item: &WorkItem, args: &Args) -> Result<(), Fault> {
    let n = args.scalar::<u32>(3)? as usize;
    let alpha = args.scalar::<f32>(4)?;
    let beta = args.scalar::<f32>(5)?;
    let (col, row) = (item.global_id(0), item.global_id(1));

    let mut sum = 0.;
    for k in 0..n {
        sum += args.read::<f32>(0, row * n + k)? * args.read::<f32>(1, k * n + col)?;
    }
    let i = row * n + col;
    args.write(2, i, alpha * sum + beta * args.read::<f32>(2, i)?)
}

fn long_vectors(item: &WorkItem, args: &Args) -> Result<(), Fault> {
    const PIXELS: usize = 8;

    let mut square = 0u64;
    let mut sum = 0u64;
    for i in item.global_id(0) * PIXELS..(item.global_id(0) + 1) * PIXELS {
        let p = args.read::<u8>(0, i)? as u64;
        square += p * p;
        sum += p;
    }
    args.update(1, 0, |x: u64| x.wrapping_add(square))?;
    args.update(2, 0, |x: u64| x.wrapping_add(sum))?;
    Ok(())
}

fn template(_: &WorkItem, _: &Args) -> Result<(), Fault> {
    Ok(())
}
