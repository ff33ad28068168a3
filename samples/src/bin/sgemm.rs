use dispatch::Session;
use samples::{
    main_with,
    sgemm::{random_matrix, sgemm, ALPHA, BETA, ORDER},
    Backend,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    main_with(|| {
        let a = random_matrix(ORDER);
        let b = random_matrix(ORDER);
        let c = random_matrix(ORDER);

        let mut session = Session::<Backend>::build()?;
        let (_c, profiling) = sgemm(&mut session, ORDER, ALPHA, BETA, [&a, &b, &c])?;
        println!("{profiling}");
        Ok(())
    })
}
