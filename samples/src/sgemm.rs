use crate::{download, execute, upload};
use dispatch::{geometry_mismatch, BufferSpec, Device, Profiling, Result, Session, WorkGeometry};
use rand::Rng;

pub const SOURCE: &str = "assets/sgemm.cl";
pub const ORDER: usize = 2048;
pub const ALPHA: f32 = 1.;
pub const BETA: f32 = 0.1;

/// `order` 阶方阵，元素在 `[-1, 1]` 内均匀分布。
pub fn random_matrix(order: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..order * order).map(|_| rng.gen_range(-1. ..=1.)).collect()
}

/// `C = alpha * A * B + beta * C`，每个工作项计算 C 的一个元素。
pub fn sgemm<D: Device>(
    session: &mut Session<D>,
    order: usize,
    alpha: f32,
    beta: f32,
    [a, b, c]: [&[f32]; 3],
) -> Result<(Vec<f32>, Profiling)> {
    let len = order * order;
    if let Some(m) = [a, b, c].iter().find(|m| m.len() != len) {
        return Err(geometry_mismatch(format!(
            "{} elements for a matrix of order {order}",
            m.len()
        )));
    }
    let size = len * std::mem::size_of::<f32>();

    let program = session.build_program(SOURCE)?;
    let kernel = session.get_kernel(program, "sgemm")?;
    let [buf_a, buf_b, buf_c] = session.create_buffers([
        BufferSpec::read_only(size),
        BufferSpec::read_only(size),
        BufferSpec::read_write(size),
    ])?;

    upload(session, buf_a, a)?;
    upload(session, buf_b, b)?;
    upload(session, buf_c, c)?;

    session.bind_argument(kernel, 0, buf_a)?;
    session.bind_argument(kernel, 1, buf_b)?;
    session.bind_argument(kernel, 2, buf_c)?;
    session.bind_argument(kernel, 3, order as u32)?;
    session.bind_argument(kernel, 4, alpha)?;
    session.bind_argument(kernel, 5, beta)?;
    let profiling = execute(session, kernel, &WorkGeometry::new(&[order, order])?)?;

    Ok((download(session, buf_c, len)?, profiling))
}

#[cfg(test)]
mod test {
    use super::{random_matrix, sgemm, ALPHA, BETA};
    use crate::test_utils::ErrorCollector;
    use dispatch::{common_cpu::Cpu, ErrorKind, Session};

    #[test]
    fn test_sgemm() {
        const N: usize = 64;
        let a = random_matrix(N);
        let b = random_matrix(N);
        let c = random_matrix(N);

        let mut session = Session::<Cpu>::build().unwrap();
        let (ans, _) = sgemm(&mut session, N, ALPHA, BETA, [&a, &b, &c]).unwrap();

        let mut reference = c.clone();
        unsafe {
            gemm::gemm(
                N,
                N,
                N,
                reference.as_mut_ptr(),
                1,
                N as _,
                true,
                a.as_ptr(),
                1,
                N as _,
                b.as_ptr(),
                1,
                N as _,
                BETA,
                ALPHA,
                false,
                false,
                false,
                gemm::Parallelism::Rayon(0),
            )
        }

        let ec = ErrorCollector::new(f32::EPSILON as f64, 1e-3).compare(&reference, &ans);
        println!("{ec}");
        let (out, count) = ec.summary();
        assert!(out * 1000 <= count);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut session = Session::<Cpu>::build().unwrap();
        let m = random_matrix(4);
        let e = sgemm(&mut session, 4, 1., 0., [&m, &m, &m[..15]]).unwrap_err();
        assert_eq!(e.kind, ErrorKind::GeometryMismatch);
    }
}
