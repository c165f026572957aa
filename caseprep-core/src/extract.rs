// caseprep-core/src/extract.rs
//! Archive extraction for downloaded tool bundles (zip, tar.gz, tar).
//!
//! Extraction is not atomic: a failure can leave the destination partial,
//! and callers are expected to re-run the whole install rather than resume.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use caseprep_common::error::{CaseprepError, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;
use zip::read::ZipArchive;

pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    fs::create_dir_all(dest_dir).map_err(|e| {
        CaseprepError::IoError(format!(
            "Failed to create extraction dir {}: {e}",
            dest_dir.display()
        ))
    })?;

    let kind = archive_kind(archive_path).ok_or_else(|| {
        CaseprepError::ExtractError(format!(
            "unsupported archive type: {}",
            archive_path.display()
        ))
    })?;
    debug!(
        "Extracting {} ({kind}) into {}",
        archive_path.display(),
        dest_dir.display()
    );

    let file = File::open(archive_path).map_err(|e| {
        CaseprepError::IoError(format!(
            "Failed to open archive {}: {e}",
            archive_path.display()
        ))
    })?;

    match kind {
        "zip" => extract_zip(file, dest_dir),
        "tar.gz" => extract_tar(GzDecoder::new(file), dest_dir),
        "tar" => extract_tar(file, dest_dir),
        _ => unreachable!(),
    }
}

fn archive_kind(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    if name.ends_with(".zip") {
        Some("zip")
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some("tar.gz")
    } else if name.ends_with(".tar") {
        Some("tar")
    } else {
        None
    }
}

fn extract_zip(file: File, dest_dir: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(file)
        .map_err(|e| CaseprepError::ExtractError(format!("invalid zip archive: {e}")))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| CaseprepError::ExtractError(format!("bad zip entry {i}: {e}")))?;
        // enclosed_name() rejects entries that would escape the
        // destination (absolute paths, `..` components).
        let rel: PathBuf = entry.enclosed_name().ok_or_else(|| {
            CaseprepError::ExtractError(format!(
                "zip entry '{}' escapes the destination directory",
                entry.name()
            ))
        })?;
        let out_path = dest_dir.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path).map_err(|e| {
            CaseprepError::IoError(format!("Failed to create {}: {e}", out_path.display()))
        })?;
        io::copy(&mut entry, &mut out_file)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode));
        }
    }
    Ok(())
}

fn extract_tar<R: io::Read>(reader: R, dest_dir: &Path) -> Result<()> {
    let mut archive = Archive::new(reader);
    for entry in archive
        .entries()
        .map_err(|e| CaseprepError::ExtractError(format!("invalid tar archive: {e}")))?
    {
        let mut entry =
            entry.map_err(|e| CaseprepError::ExtractError(format!("bad tar entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| CaseprepError::ExtractError(format!("bad tar entry path: {e}")))?
            .into_owned();
        if escapes_destination(&path) {
            return Err(CaseprepError::ExtractError(format!(
                "tar entry '{}' escapes the destination directory",
                path.display()
            )));
        }
        entry
            .unpack_in(dest_dir)
            .map_err(|e| CaseprepError::ExtractError(format!("failed to unpack entry: {e}")))?;
    }
    Ok(())
}

fn escapes_destination(rel: &Path) -> bool {
    let mut depth: i32 = 0;
    for comp in rel.components() {
        match comp {
            Component::Prefix(_) | Component::RootDir => return true,
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn make_zip(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("fixture.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn make_tar_gz(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("fixture.tar.gz");
        let file = File::create(&path).unwrap();
        let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(enc);
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[test]
    fn extracts_zip_with_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = make_zip(
            tmp.path(),
            &[("tool/bin/tool.exe", "MZ"), ("tool/README.txt", "docs")],
        );
        let dest = tmp.path().join("out");
        extract_archive(&archive, &dest).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("tool/bin/tool.exe")).unwrap(),
            "MZ"
        );
        assert_eq!(fs::read_to_string(dest.join("tool/README.txt")).unwrap(), "docs");
    }

    #[test]
    fn extracts_tar_gz() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = make_tar_gz(tmp.path(), &[("tool/tool.sh", "#!/bin/sh\n")]);
        let dest = tmp.path().join("out");
        extract_archive(&archive, &dest).unwrap();
        assert!(dest.join("tool/tool.sh").is_file());
    }

    #[test]
    fn zip_traversal_entry_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = make_zip(tmp.path(), &[("../evil.txt", "pwn")]);
        let dest = tmp.path().join("out");
        let err = extract_archive(&archive, &dest).unwrap_err();
        assert!(matches!(err, CaseprepError::ExtractError(_)));
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = tmp.path().join("tool.7z");
        fs::write(&bogus, b"7z").unwrap();
        assert!(matches!(
            extract_archive(&bogus, &tmp.path().join("out")),
            Err(CaseprepError::ExtractError(_))
        ));
    }

    #[test]
    fn escape_detection() {
        assert!(escapes_destination(Path::new("../x")));
        assert!(escapes_destination(Path::new("a/../../x")));
        assert!(!escapes_destination(Path::new("a/../x")));
        assert!(!escapes_destination(Path::new("a/b/c")));
    }
}
