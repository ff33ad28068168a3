use crate::{download, execute, upload};
use dispatch::{geometry_mismatch, BufferSpec, Device, Profiling, Result, Session, WorkGeometry};

pub const SOURCE: &str = "assets/hello_world_opencl.cl";
pub const ARRAY_SIZE: usize = 1_000_000;

/// 在设备上逐元素相加，每个工作项处理一个元素。
pub fn vector_add<D: Device>(
    session: &mut Session<D>,
    a: &[i32],
    b: &[i32],
) -> Result<(Vec<i32>, Profiling)> {
    if a.len() != b.len() {
        return Err(geometry_mismatch(format!(
            "inputs of {} and {} elements",
            a.len(),
            b.len()
        )));
    }
    let n = a.len();
    let size = std::mem::size_of_val(a);

    let program = session.build_program(SOURCE)?;
    let kernel = session.get_kernel(program, "hello_world_opencl")?;
    let [input_a, input_b, output] = session.create_buffers([
        BufferSpec::read_only(size),
        BufferSpec::read_only(size),
        BufferSpec::write_only(size),
    ])?;

    upload(session, input_a, a)?;
    upload(session, input_b, b)?;

    session.bind_argument(kernel, 0, input_a)?;
    session.bind_argument(kernel, 1, input_b)?;
    session.bind_argument(kernel, 2, output)?;
    let profiling = execute(session, kernel, &WorkGeometry::tiled(&[n], &[1])?)?;

    Ok((download(session, output, n)?, profiling))
}

#[cfg(test)]
mod test {
    use super::vector_add;
    use crate::hello_world_c;
    use dispatch::{common_cpu::Cpu, ErrorKind, Session};
    use rand::Rng;

    #[test]
    fn test_vector_add() {
        let mut rng = rand::thread_rng();
        let a = (0..1 << 16).map(|_| rng.gen_range(-1 << 20..1 << 20)).collect::<Vec<i32>>();
        let b = (0..1 << 16).map(|_| rng.gen_range(-1 << 20..1 << 20)).collect::<Vec<i32>>();

        let mut session = Session::<Cpu>::build().unwrap();
        let (ans, profiling) = vector_add(&mut session, &a, &b).unwrap();
        assert_eq!(ans, hello_world_c::vector_add(&a, &b));
        assert!(profiling.start <= profiling.end);
    }

    #[test]
    fn test_mismatched_inputs() {
        let mut session = Session::<Cpu>::build().unwrap();
        let e = vector_add(&mut session, &[1, 2], &[1]).unwrap_err();
        assert_eq!(e.kind, ErrorKind::GeometryMismatch);
    }
}
