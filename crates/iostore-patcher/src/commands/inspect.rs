use crate::errors::CliError;
use crate::println_pad;
use crate::utils::format_id;
use camino::Utf8PathBuf;
use colored::Colorize;
use iostore_core::batch::BULK_EXTENSION;
use iostore_core::TocDocument;
use miette::Result;

pub struct InspectArgs {
    pub file_path: Utf8PathBuf,
}

pub fn inspect_container(args: InspectArgs) -> Result<()> {
    let doc = TocDocument::from_file_path(args.file_path.as_std_path())
        .map_err(|e| CliError::inspect_failed(args.file_path.clone(), e))?;
    let header = doc.header();

    println_pad!(
        "{} {}",
        "📦 Container:".bright_blue().bold(),
        args.file_path.as_str().bright_cyan().bold()
    );
    println_pad!(
        "{} {}",
        "🆔 Container id:".bright_green(),
        format_id(doc.container_id()).bright_white().bold()
    );
    println_pad!("{} {}", "Version:".bright_white(), header.version);
    println_pad!(
        "{} {} ({} bytes)",
        "Entries:".bright_white(),
        header.entry_count,
        doc.file_len()
    );
    println_pad!(
        "{} {} x {:#x}",
        "Compressed blocks:".bright_white(),
        header.compressed_block_entry_count,
        header.compression_block_size
    );
    println_pad!(
        "{} entries={:#x} locations={:#x} blocks={:#x}",
        "Table offsets:".bright_white(),
        doc.entries_offset(),
        doc.locations_offset(),
        doc.blocks_offset()
    );
    if doc.is_encrypted() {
        println_pad!("{}", "🔒 Encrypted".bright_yellow());
    }
    if header.perfect_hash_seeds_count > 0 || header.chunks_without_perfect_hash_count > 0 {
        println_pad!(
            "{} seeds={} without={}",
            "Perfect hash:".bright_yellow(),
            header.perfect_hash_seeds_count,
            header.chunks_without_perfect_hash_count
        );
    }

    println_pad!("\n{}", "🏗️  Container header:".bright_magenta().bold());
    match doc.container_header_index() {
        Some(index) => {
            println_pad!(
                "   {} entry {} at {:#x}",
                "•".bright_cyan(),
                index,
                doc.entry_offset(index)
            );
            if let Some(location) = doc.data_location(index) {
                println_pad!(
                    "   {} logical {:#x} (+{:#x})",
                    "•".bright_cyan(),
                    location.offset,
                    location.length
                );
                match doc.physical_offset_for(location.offset) {
                    Ok(physical) => println_pad!(
                        "   {} physical {:#x} in {}",
                        "•".bright_cyan(),
                        physical,
                        args.file_path.with_extension(BULK_EXTENSION)
                    ),
                    Err(e) => println_pad!("   {} {}", "✗".bright_red(), e),
                }
            }
        }
        None => println_pad!(
            "   {} {}",
            "✗".bright_red(),
            "no container-header entry matches the container id".bright_red()
        ),
    }

    let package_ids: Vec<u64> = doc.package_ids().collect();
    println_pad!(
        "\n{} {}",
        "🧾 Package ids:".bright_magenta().bold(),
        package_ids.len()
    );
    for id in package_ids {
        println_pad!("   {} {}", "•".bright_cyan(), format_id(id));
    }

    Ok(())
}
