use dispatch::Session;
use samples::{image, main_with, sobel::sobel, Backend};
use std::process::ExitCode;

fn main() -> ExitCode {
    main_with(|| {
        let bitmap = image::load("assets/input.bmp")?;
        let (width, height) = (bitmap.width, bitmap.height);
        let mut luminance = vec![0; width * height];
        image::rgb_to_luminance(&bitmap.pixels, &mut luminance);

        let mut session = Session::<Backend>::build()?;
        let (gradients, profiling) = sobel(&mut session, &luminance, width, height)?;
        println!("{profiling}");
        let report = session.release_all();
        log::debug!("{report:?}");

        let mut rgb = vec![0; width * height * 3];
        for (name, channel) in ["output-dX.bmp", "output-dY.bmp", "output.bmp"]
            .into_iter()
            .zip(gradients.magnitudes())
        {
            image::luminance_to_rgb(&channel, &mut rgb);
            image::save(name, width, height, &rgb)?;
            log::info!("saved {name}");
        }
        Ok(())
    })
}
