// Interactive shell around the FAT12 engine
// Prompts for an image name, then dispatches single-line commands against
// the opened image. Operation failures are printed and the session keeps
// running.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use fatpack_fat12::{DirEntry, DiskReport, Fat12Image};

const TABLE_WIDTH: usize = 53;

#[derive(Parser)]
#[command(name = "fatpack")]
#[command(about = "FAT12 disk image shell", long_about = None)]
struct Cli {
    /// Disk image name; opens ./<name>.img and skips the first prompt
    image: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut pending = cli.image;

    loop {
        let name = match pending.take() {
            Some(name) => name,
            None => {
                println!("Please enter disk image name:");
                match lines.next() {
                    Some(line) => line?,
                    None => return Ok(()),
                }
            }
        };
        let image_path = PathBuf::from(format!("./{}.img", name.trim()));
        if !image_path.exists() {
            eprintln!("\nERROR: disk image not found: {}\n", image_path.display());
            continue;
        }

        match Fat12Image::open(&image_path) {
            Ok(mut image) => {
                println!("Type '?' for help.\n");
                if !run_session(&mut image, &mut lines)? {
                    return Ok(());
                }
            }
            Err(e) => eprintln!("ERROR: {e}"),
        }
    }
}

/// Command loop for one opened image. Returns false when stdin is exhausted,
/// true when the user asked to leave the session.
fn run_session(
    image: &mut Fat12Image,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> anyhow::Result<bool> {
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            return Ok(false);
        };
        let line = line?;
        let command = line.trim();

        match command {
            "" => {}
            "?" => print_help(),
            "ls" => {
                print_title("Listing Files and Directories");
                list_directory(image.root_entries());
                for entries in image.subdirectories().values() {
                    list_directory(entries);
                }
                println!();
            }
            "ls-1" => {
                print_title("Listing Root Directory");
                list_directory(image.root_entries());
                println!();
            }
            "status" => match image.report() {
                Ok(report) => print_report(&report),
                Err(e) => eprintln!("ERROR: {e}"),
            },
            "exit" | "quit" => return Ok(true),
            _ if command.starts_with("export ") => {
                let path = unquote(&command["export ".len()..]);
                match image.export(path, Path::new(".")) {
                    Ok(dest) => println!("File copied to system: {}", dest.display()),
                    Err(e) => eprintln!("ERROR: {e}"),
                }
            }
            _ if command.starts_with("import ") => {
                let source = unquote(&command["import ".len()..]);
                match image.import(Path::new(source)) {
                    Ok(name) => println!("File copied from system to disk image: {name}"),
                    Err(e) => eprintln!("ERROR: {e}"),
                }
            }
            _ => println!("Unknown command. Type '?' for help."),
        }
    }
}

fn unquote(raw: &str) -> &str {
    raw.trim().trim_matches('"')
}

fn print_help() {
    println!("{:<20}{:<40}", "| Command", "| Description");
    println!("|{:-<19}|{:-<39}|", "", "");
    println!("{:<20}{:<40}", "| ?", "| Show available commands");
    println!("{:<20}{:<40}", "| ls", "| List files and directories");
    println!("{:<20}{:<40}", "| ls-1", "| List the root directory only");
    println!("{:<20}{:<40}", "| export \"path\"", "| Copy a file out of the image");
    println!("{:<20}{:<40}", "| import \"path\"", "| Copy a host file into the image");
    println!("{:<20}{:<40}", "| status", "| Disk capacity and usage report");
    println!("{:<20}{:<40}", "| exit", "| Leave this image");
}

fn print_title(title: &str) {
    println!("{:-<TABLE_WIDTH$}", "");
    println!("{:^TABLE_WIDTH$}", format!("| {title} |"));
    println!("{:-<TABLE_WIDTH$}", "");
}

fn list_directory(entries: &[DirEntry]) {
    for entry in entries {
        if entry.is_tombstone() {
            continue;
        }
        if entry.is_directory {
            println!("{}{} (dir)", entry.path, entry.name);
        } else {
            println!("{}{}", entry.path, entry.full_name());
        }
    }
}

fn print_report(report: &DiskReport) {
    print_title("Disk Analysis");
    print_report_row("Partition Size:", report.partition_size);
    print_report_row("Reserved Area Size:", report.reserved_size);
    print_report_row("FAT Size:", report.fat_size);
    print_report_row("Root Directory Size:", report.root_directory_size);
    print_report_row("Data Area Size:", report.data_area_size);
    print_report_row("Used Space:", report.used_space);
    print_report_row("Available Space:", report.available_space);
    println!("{:-<TABLE_WIDTH$}", "");
    println!();
}

fn print_report_row(label: &str, value: u64) {
    println!("| {:<22}{:>20} bytes |", label, value);
}
