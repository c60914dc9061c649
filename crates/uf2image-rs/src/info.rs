use std::{fs, path::Path};

use log::{info, warn};
use uf2image_core::{read_image, Uf2Event, BLOCK_SIZE, DEFAULT_FILL};

pub fn info<P: AsRef<Path>>(input_path: &P) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input_path)?;

    let mut events: Vec<Uf2Event> = Vec::new();
    let image = read_image(&bytes, DEFAULT_FILL, &mut events)?;

    info!("{} blocks", bytes.len() / BLOCK_SIZE);

    for event in &events {
        match event {
            Uf2Event::FamilyResolved {
                id,
                family: Some(family),
            } => {
                let mut details = String::new();
                if let Some(arch) = family.arch {
                    details.push_str(&format!(" arch={arch}"));
                }
                if let Some(cpu) = family.cpu {
                    details.push_str(&format!(" cpu={cpu}"));
                }
                if let Some(bits) = family.bits {
                    details.push_str(&format!(" bits={bits}"));
                }
                info!(
                    "family {id:#010x} {} ({}){details}",
                    family.name, family.description
                );
            }
            Uf2Event::FamilyResolved { id, family: None } => {
                warn!("family {id:#010x} unknown");
            }
            Uf2Event::FamilyChanged { id } => {
                warn!("family id changed to {id:#010x}");
            }
            Uf2Event::FileContainerEntry {
                block_no,
                name,
                size,
                offset,
            } => {
                info!("file \"{name}\" ({size} bytes, block #{block_no} @ file offset {offset})");
            }
            Uf2Event::ChecksumPresent { block_no, checksum } => {
                info!(
                    "md5 checksum in block #{block_no} covers {} bytes @ {:#010x} (not verified)",
                    checksum.region_len, checksum.region_addr
                );
            }
            Uf2Event::ExtensionTag {
                block_no,
                tag,
                name,
                size,
            } => {
                info!("extension tag {tag:#08x} ({name}, {size} bytes) in block #{block_no}");
            }
            Uf2Event::UnknownExtensionTag {
                block_no,
                tag,
                size,
            } => {
                warn!("unknown extension tag {tag:#08x} ({size} bytes) in block #{block_no}");
            }
            Uf2Event::Skip { block_no } => {
                warn!("not-main-flash block #{block_no}, payload not mapped");
            }
            Uf2Event::Annotation { text, .. } => {
                info!("{text}");
            }
            // every written block already shows up as its annotation
            Uf2Event::BlockWritten { .. } => {}
        }
    }

    if let Some((base, end)) = image.span() {
        info!("image spans {base:#010x}..{end:#010x} ({} bytes)", end - base);
    } else {
        info!("no block wrote to the image");
    }

    Ok(())
}
