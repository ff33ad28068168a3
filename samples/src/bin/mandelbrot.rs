use dispatch::Session;
use samples::{
    image, main_with,
    mandelbrot::{mandelbrot, HEIGHT, WIDTH},
    Backend,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    main_with(|| {
        let mut session = Session::<Backend>::build()?;
        let (luminance, profiling) = mandelbrot(&mut session, WIDTH, HEIGHT)?;
        println!("{profiling}");

        let mut rgb = vec![0; WIDTH * HEIGHT * 3];
        image::luminance_to_rgb(&luminance, &mut rgb);
        image::save("output.bmp", WIDTH, HEIGHT, &rgb)?;
        Ok(())
    })
}
