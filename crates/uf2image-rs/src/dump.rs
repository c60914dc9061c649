use std::{
    fs::{self, File},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use assert_into::AssertInto;
use log::{info, LevelFilter};
use pbr::{ProgressBar, Units};
use uf2image_core::{read_image, LogSink, SparseImage};

pub fn dump<P1: AsRef<Path>, P2: AsRef<Path>>(
    input_path: &P1,
    output_path: &P2,
    fill: u8,
    base: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input_path)?;

    let mut image = read_image(&bytes, fill, &mut LogSink)?;

    let Some((lowest, end)) = image.span() else {
        return Err("container wrote no bytes to the image".into());
    };
    let base = base.map(u64::from).unwrap_or(lowest);
    if base >= end {
        return Err(format!(
            "base {base:#010x} is past the end of the written image ({end:#010x})"
        )
        .into());
    }
    let len = end - base;

    info!("Writing {len} bytes @ {base:#010x} to disk");

    let output = File::create(output_path)?;
    if let Err(err) = copy_image(&mut image, base, len, output) {
        fs::remove_file(output_path)?;
        return Err(err);
    }

    Ok(())
}

fn copy_image(
    image: &mut SparseImage,
    base: u64,
    len: u64,
    mut output: File,
) -> Result<(), Box<dyn std::error::Error>> {
    let should_print_progress = log::max_level() >= LevelFilter::Info;
    let mut pb = should_print_progress.then(|| {
        let mut pb = ProgressBar::new(len);
        pb.set_units(Units::Bytes);
        pb
    });

    image.seek(SeekFrom::Start(base))?;

    let mut buf = vec![0u8; 64 * 1024];
    let mut remaining = len;
    while remaining > 0 {
        let n: usize = remaining.min(buf.len() as u64).assert_into();
        image.read_exact(&mut buf[..n])?;
        output.write_all(&buf[..n])?;
        if let Some(pb) = pb.as_mut() {
            pb.add(n as u64);
        }
        remaining -= n as u64;
    }

    if let Some(pb) = pb.as_mut() {
        pb.finish();
        println!();
    }

    Ok(())
}
