use samples::{hello_world_c::vector_add, hello_world_opencl::ARRAY_SIZE, main_with};
use std::process::ExitCode;

fn main() -> ExitCode {
    main_with(|| {
        let input = (0..ARRAY_SIZE as i32).collect::<Vec<_>>();
        let output = vector_add(&input, &input);
        log::info!("output[{}] = {}", ARRAY_SIZE - 1, output[ARRAY_SIZE - 1]);
        Ok(())
    })
}
