use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use crate::humanize::ByteSize;

const INDENT: &str = "  ";

/// Render a directory tree as indented text
///
/// Folders come first, then files, both sorted by name. Each file line
/// carries its size; each folder line the total size of its contents.
pub fn index_folder(root: &Path) -> io::Result<String> {
    let mut out = String::new();
    let total = write_folder(root, 0, &mut out)?;
    let name = folder_name(root);

    let mut text = String::with_capacity(out.len() + 64);
    let _ = writeln!(text, "{} ({})", name, ByteSize(total));
    text.push_str(&out);
    Ok(text)
}

/// Display name for a folder path
pub fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_folder(path: &Path, depth: usize, out: &mut String) -> io::Result<u64> {
    let mut folders: Vec<PathBuf> = Vec::new();
    let mut files: Vec<(String, u64)> = Vec::new();

    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            folders.push(entry.path());
        } else if file_type.is_file() {
            let size = entry.metadata()?.len();
            files.push((entry.file_name().to_string_lossy().into_owned(), size));
        }
    }
    folders.sort();
    files.sort();

    let indent = INDENT.repeat(depth + 1);
    let mut total = 0u64;

    for folder in folders {
        let mut nested = String::new();
        let size = write_folder(&folder, depth + 1, &mut nested)?;
        let _ = writeln!(out, "{indent}{}/ ({})", folder_name(&folder), ByteSize(size));
        out.push_str(&nested);
        total += size;
    }
    for (name, size) in files {
        let _ = writeln!(out, "{indent}{name} ({})", ByteSize(size));
        total += size;
    }
    Ok(total)
}
