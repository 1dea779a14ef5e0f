use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// First candidate that exists as a regular file, in the given order.
///
/// `on_probe` is called for every candidate examined, including the winner.
pub fn first_file<'a, I, F>(candidates: I, mut on_probe: F) -> Option<PathBuf>
where
    I: IntoIterator<Item = &'a PathBuf>,
    F: FnMut(&Path, bool),
{
    for candidate in candidates {
        let exists = candidate.is_file();
        on_probe(candidate, exists);
        if exists {
            return Some(candidate.clone());
        }
    }
    None
}

/// First candidate that exists as a directory, in the given order.
pub fn first_dir<'a, I, F>(candidates: I, mut on_probe: F) -> Option<PathBuf>
where
    I: IntoIterator<Item = &'a PathBuf>,
    F: FnMut(&Path, bool),
{
    for candidate in candidates {
        let exists = candidate.is_dir();
        on_probe(candidate, exists);
        if exists {
            return Some(candidate.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_to_string_lossy_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x7b, 0x7d, 0x80]).unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert!(content.starts_with("{}"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_first_file_respects_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.js");
        let b = dir.path().join("b.js");
        let c = dir.path().join("c.js");
        fs::write(&b, "").unwrap();
        fs::write(&c, "").unwrap();

        let mut probed = Vec::new();
        let found = first_file(&[a.clone(), b.clone(), c], |p, _| probed.push(p.to_path_buf()));
        assert_eq!(found, Some(b.clone()));
        // Stops at the first hit
        assert_eq!(probed, vec![a, b]);
    }

    #[test]
    fn test_first_file_skips_directories() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("index.js");
        fs::create_dir(&sub).unwrap();

        assert!(first_file(&[sub.clone()], |_, _| {}).is_none());
        assert_eq!(first_dir(&[sub.clone()], |_, _| {}), Some(sub));
    }
}
