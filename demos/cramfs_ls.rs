//! List a cramfs image, or print one file from it
//!
//! Usage: cramfs_ls IMAGE [PATH]

use cramfs::{FileType, Filesystem, Inode};

use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::{Format, Severity};
use sloggers::Build;
use std::io::Write;

fn main() {
    std::process::exit(real_main());
}

fn real_main() -> i32 {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(Severity::Debug);
    builder.destination(Destination::Stderr);
    builder.format(Format::Full);
    let logger = builder.build().unwrap();

    let mut args = std::env::args_os().skip(1);
    let image = match args.next() {
        Some(image) => image,
        None => {
            eprintln!("usage: cramfs_ls IMAGE [PATH]");
            return 2;
        }
    };

    let fs = match Filesystem::open_with_logger(&image, logger.clone()) {
        Ok(fs) => fs,
        Err(e) => {
            slog::crit!(logger, "{}", e);
            return 1;
        }
    };

    let result = match args.next() {
        Some(path) => cat(&fs, path.to_string_lossy().as_bytes()),
        None => list(&fs, &fs.root(), "", 0),
    };
    match result {
        Ok(()) => 0,
        Err(e) => {
            slog::error!(logger, "{}", e);
            1
        }
    }
}

fn cat(fs: &Filesystem, path: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let inode = fs
        .resolve(path)?
        .ok_or_else(|| format!("{}: no such file", String::from_utf8_lossy(path)))?;
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    for index in 0..inode.page_count() {
        let page = fs.read_page(&inode, index)?;
        let len = (inode.size() as usize - index as usize * page.len()).min(page.len());
        stdout.write_all(&page[..len])?;
    }
    Ok(())
}

fn list(
    fs: &Filesystem,
    dir: &Inode,
    prefix: &str,
    depth: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    for entry in fs.readdir(dir, 0)? {
        let entry = entry?;
        let inode = entry.inode();
        let path = format!("{}/{}", prefix, entry.name());
        match entry.file_type() {
            FileType::Symlink => {
                let target = fs.read_link(inode)?;
                println!("{} {:>8} {} -> {}", inode.mode(), inode.size(), path, target);
            }
            FileType::CharDevice | FileType::BlockDevice => {
                let rdev = inode.rdev().unwrap_or(0);
                println!("{} {:>3},{:>4} {}", inode.mode(), rdev >> 8, rdev & 0xff, path);
            }
            _ => println!("{} {:>8} {}", inode.mode(), inode.size(), path),
        }
        if inode.is_dir() && depth < 32 {
            list(fs, inode, &path, depth + 1)?;
        }
    }
    Ok(())
}
