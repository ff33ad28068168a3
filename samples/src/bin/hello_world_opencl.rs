use dispatch::Session;
use samples::{
    hello_world_opencl::{vector_add, ARRAY_SIZE},
    main_with, Backend,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    main_with(|| {
        let mut session = Session::<Backend>::build()?;
        let input = (0..ARRAY_SIZE as i32).collect::<Vec<_>>();
        let (output, profiling) = vector_add(&mut session, &input, &input)?;
        println!("{profiling}");
        log::info!("output[{}] = {}", ARRAY_SIZE - 1, output[ARRAY_SIZE - 1]);
        Ok(())
    })
}
