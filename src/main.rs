use std::fs;
use std::path::PathBuf;

use clap::Parser;
use lenstrace::error::{LenstraceError, LtResult};
use lenstrace::formats::system_from_yaml;
use lenstrace::{GeometricTrace, OpticalSystem, ParaxialTrace};
use log::info;
use uom::si::f64::Length;

#[derive(Parser)]
#[command(author, version, about = "sequential optical ray tracing")]
struct Args {
    /// YAML prescription file
    file_path: PathBuf,
    /// trace a 21-ray meridional fan at the field edge
    #[arg(short, long)]
    fan: bool,
    /// trace the field-edge clipping rays and print the aperture margins
    #[arg(short, long)]
    clipping: bool,
    /// wavelength in nm (defaults to the first design wavelength)
    #[arg(short, long)]
    wavelength: Option<f64>,
}

fn read_system(args: &Args) -> LtResult<OpticalSystem> {
    let contents = fs::read_to_string(&args.file_path).map_err(|e| {
        LenstraceError::Other(format!(
            "cannot read file {}: {e}",
            args.file_path.display()
        ))
    })?;
    system_from_yaml(&contents)
}

fn wavelength(args: &Args, system: &OpticalSystem) -> LtResult<Length> {
    args.wavelength.map_or_else(
        || {
            system.wavelengths().first().copied().ok_or_else(|| {
                LenstraceError::Structural("the system defines no wavelengths".into())
            })
        },
        |nm| Ok(lenstrace::nanometer!(nm)),
    )
}

fn main() -> LtResult<()> {
    env_logger::init();
    let args = Args::parse();
    let system = read_system(&args)?;
    info!("loaded '{}', {} elements", system.name(), system.len());
    print!("{system}");
    let wavelength = wavelength(&args, &system)?;
    let paraxial = ParaxialTrace::new(&system, wavelength)?;
    println!();
    print!("{paraxial}");
    println!();
    if let Some(efl) = paraxial.effective_focal_length() {
        println!("effective focal length: {efl:.6}");
    }
    if let Some(d) = paraxial.image_distance() {
        println!("paraxial image distance: {d:.6}");
    }
    if let Some(h) = paraxial.image_height() {
        println!("paraxial image height: {h:.6}");
    }
    let [ep, xp] = paraxial.pupil_distance();
    let [eh, xh] = paraxial.pupil_height();
    println!("entrance pupil: {ep:.6} @ {eh:.6}");
    println!("exit pupil: {xp:.6} @ {xh:.6}");
    if args.fan {
        let fan = GeometricTrace::rays_paraxial_line(&system, &paraxial)?;
        println!();
        print!("{fan}");
    }
    if args.clipping {
        let clipping = GeometricTrace::rays_paraxial_clipping(&system, &paraxial)?;
        let margins = clipping.clipping_margins(&system);
        println!();
        print!("{clipping}");
        println!(
            "clipping margins: lower {:.3e}, upper {:.3e}",
            margins[0], margins[1]
        );
    }
    Ok(())
}
