use dispatch::Session;
use samples::{
    fir_float::{fir, to_float, to_luminance},
    image, main_with, Backend,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    main_with(|| {
        let bitmap = image::load("assets/input.bmp")?;
        let (width, height) = (bitmap.width, bitmap.height);
        let mut luminance = vec![0; width * height];
        image::rgb_to_luminance(&bitmap.pixels, &mut luminance);

        let mut session = Session::<Backend>::build()?;
        let (output, profiling) = fir(&mut session, &to_float(&luminance), width, height)?;
        println!("{profiling}");

        let mut rgb = vec![0; width * height * 3];
        image::luminance_to_rgb(&to_luminance(&output), &mut rgb);
        image::save("output.bmp", width, height, &rgb)?;
        Ok(())
    })
}
