//! Atomic publishing of output files.
//!
//! Every file is first written to a temporary file in the destination's
//! directory, flushed and fsynced, then renamed onto the destination and
//! the directory fsynced. A reader of the destination sees either the
//! previous content or the complete new file, never a partial one.
//! Published files get the usual `0o666` mode minus the process umask.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::container::write_container;
use crate::dataset::Dataset;
use crate::encoding::EncodingSpec;
use crate::{Error, Result};

/// Summary of one published dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    pub destination: PathBuf,
    /// Size of the published file.
    pub bytes_written: u64,
    pub variables: usize,
    /// Variables written with rounding applied.
    pub quantized_variables: usize,
}

/// Write through `write` into a temporary file, then rename it onto
/// `destination`.
///
/// Failures before the rename are write errors and leave no temporary
/// file behind; a failed rename is a publish error. In both cases
/// `destination` is untouched. A failed fsync of the directory after the
/// rename is also a publish error. Returns the size of the published file.
pub fn publish_atomically<F>(destination: impl AsRef<Path>, write: F) -> Result<u64>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let destination = destination.as_ref();
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".bitkeep-").suffix(".tmp");
    // tempfile defaults to owner-only; open() applies the umask to this
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }

    let mut temp = builder
        .tempfile_in(parent)
        .map_err(|e| Error::write_io(destination, "cannot create temporary file", e))?;

    {
        let mut out = BufWriter::new(temp.as_file_mut());
        write(&mut out).map_err(|e| match e {
            Error::Io(io) => Error::write_io(destination, "write to temporary file failed", io),
            other => other,
        })?;
        out.flush()
            .map_err(|e| Error::write_io(destination, "flush of temporary file failed", e))?;
    }

    temp.as_file()
        .sync_all()
        .map_err(|e| Error::write_io(destination, "fsync of temporary file failed", e))?;
    let bytes = temp
        .as_file()
        .metadata()
        .map_err(|e| Error::write_io(destination, "cannot stat temporary file", e))?
        .len();

    debug!("publishing {} ({} bytes)", destination.display(), bytes);

    // A failed persist hands the temp file back; dropping it removes it.
    temp.persist(destination)
        .map_err(|e| Error::publish(destination, e.error))?;

    #[cfg(unix)]
    std::fs::File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| Error::publish(destination, e))?;

    Ok(bytes)
}

/// Write `dataset` as a GAC file at `destination`, atomically.
///
/// `encodings` maps variable names to their storage encoding; variables
/// without an entry are stored with [`EncodingSpec::default`] (shuffle +
/// zlib), quantized or not.
pub fn write_dataset(
    dataset: &Dataset,
    encodings: &IndexMap<String, EncodingSpec>,
    destination: impl AsRef<Path>,
) -> Result<WriteReport> {
    let destination = destination.as_ref();
    let bytes_written = publish_atomically(destination, |out| {
        write_container(out, dataset, encodings).map(|_| ())
    })?;

    let quantized_variables = dataset
        .variable_names()
        .filter(|name| encodings.get(*name).is_some_and(EncodingSpec::is_quantized))
        .count();

    Ok(WriteReport {
        destination: destination.to_path_buf(),
        bytes_written,
        variables: dataset.len(),
        quantized_variables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".bitkeep-"))
            .collect()
    }

    #[test]
    fn test_publish_writes_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");

        let n = publish_atomically(&dest, |w| {
            w.write_all(b"hello world")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(n, 11);
        assert_eq!(fs::read(&dest).unwrap(), b"hello world");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_write_leaves_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        fs::write(&dest, b"previous").unwrap();

        let err = publish_atomically(&dest, |w| {
            w.write_all(b"partial")?;
            Err(Error::corrupted("encoder blew up"))
        })
        .unwrap_err();

        assert_eq!(err.category(), "corrupted_data");
        assert_eq!(fs::read(&dest).unwrap(), b"previous");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_io_failure_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");

        let err = publish_atomically(&dest, |_| {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
        })
        .unwrap_err();

        assert_eq!(err.category(), "write");
        assert!(!dest.exists());
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_parent_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("no/such/dir/out.bin");
        let err = publish_atomically(&dest, |_| Ok(())).unwrap_err();
        assert_eq!(err.category(), "write");
    }

    #[test]
    fn test_rename_onto_directory_is_publish_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("occupied");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep"), b"x").unwrap();

        let err = publish_atomically(&dest, |w| {
            w.write_all(b"data")?;
            Ok(())
        })
        .unwrap_err();

        assert_eq!(err.category(), "publish");
        assert!(dest.is_dir());
        assert!(leftovers(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_published_mode_matches_plain_files() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/out.bin");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        publish_atomically(&dest, |w| {
            w.write_all(b"data")?;
            Ok(())
        })
        .unwrap();

        let plain = dir.path().join("nested/plain.bin");
        fs::write(&plain, b"data").unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dest), mode(&plain));
        assert!(leftovers(&dir.path().join("nested")).is_empty());
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        fs::write(&dest, b"old content that is longer").unwrap();

        publish_atomically(&dest, |w| {
            w.write_all(b"new")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }
}
