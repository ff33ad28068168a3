use dispatch::Session;
use samples::{main_with, template::template, Backend};
use std::process::ExitCode;

fn main() -> ExitCode {
    main_with(|| {
        let mut session = Session::<Backend>::build()?;
        println!("{}", template(&mut session)?);
        Ok(())
    })
}
