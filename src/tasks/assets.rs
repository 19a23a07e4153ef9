use std::fs;
use std::time::Instant;

use camino::Utf8PathBuf;

use crate::files;
use crate::registry::Work;
use crate::utils::{as_overhead, human_size};

/// Deletes the directory if it exists and recreates it empty. Usually the
/// first task of a full build, so stale outputs never survive.
pub fn clean(dir: impl Into<Utf8PathBuf>) -> Work {
    let dir = dir.into();

    Work::new(move |_| {
        let start = Instant::now();

        if fs::metadata(&dir).is_ok() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        eprintln!("Cleaned the {dir} directory {}", as_overhead(start));
        Ok(())
    })
}

/// Copies files matching `source` into `dest` verbatim, preserving their
/// layout below the pattern's static prefix. Dotfiles are included.
pub fn copy(source: impl Into<String>, dest: impl Into<Utf8PathBuf>) -> Work {
    let source = source.into();
    let dest = dest.into();

    Work::new(move |_| {
        let start = Instant::now();

        let records = files::read_glob(&source)?;
        let base = files::glob_base(&source);
        let total: u64 = records.iter().map(|r| r.content.len() as u64).sum();

        files::write_records(&records, &base, &dest)?;

        tracing::info!(
            "copy: {} files, {} {}",
            records.len(),
            human_size(total),
            as_overhead(start)
        );
        Ok(())
    })
}
