use dispatch::Session;
use samples::{image, long_vectors::pixel_sums, main_with, Backend};
use std::process::ExitCode;

fn main() -> ExitCode {
    main_with(|| {
        let mut session = Session::<Backend>::build()?;

        let bitmap = image::load("assets/input.bmp")?;
        let mut luminance = vec![0; bitmap.width * bitmap.height];
        image::rgb_to_luminance(&bitmap.pixels, &mut luminance);

        let (sums, profiling) = pixel_sums(&mut session, &luminance)?;
        println!("{profiling}");
        println!("Square of the pixel values = {}", sums.square);
        println!("Sum of the pixel values = {}", sums.sum);
        Ok(())
    })
}
