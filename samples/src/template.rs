//! 最小的调度骨架：一个没有参数的 kernel 和一个工作项。

use crate::execute;
use dispatch::{Device, Profiling, Result, Session, WorkGeometry};

pub const SOURCE: &str = "assets/template.cl";

pub fn template<D: Device>(session: &mut Session<D>) -> Result<Profiling> {
    let program = session.build_program(SOURCE)?;
    let kernel = session.get_kernel(program, "template")?;
    execute(session, kernel, &WorkGeometry::new(&[1])?)
}

#[test]
fn test_template() {
    use dispatch::common_cpu::Cpu;

    let mut session = Session::<Cpu>::build().unwrap();
    let profiling = template(&mut session).unwrap();
    assert!(profiling.queued <= profiling.submit);
    assert_eq!(session.release_all().kernels, 1);
}
