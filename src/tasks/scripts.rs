use std::time::Instant;

use camino::Utf8PathBuf;

use crate::files;
use crate::registry::Work;
use crate::utils::{as_overhead, human_size};

/// Copies script bundles matching `source` into `dest`, preserving their
/// layout below the pattern's static prefix.
///
/// Bundling and transpilation are the job of an external bundler run ahead
/// of the pipeline; this stage only moves finished build products into
/// place, skipping files whose content has not changed.
pub fn scripts(source: impl Into<String>, dest: impl Into<Utf8PathBuf>) -> Work {
    let source = source.into();
    let dest = dest.into();

    Work::new(move |_| {
        let start = Instant::now();

        let records = files::read_glob(&source)?;
        let base = files::glob_base(&source);
        let total: u64 = records.iter().map(|r| r.content.len() as u64).sum();

        files::write_records(&records, &base, &dest)?;

        tracing::info!(
            "scripts: {} files, {} {}",
            records.len(),
            human_size(total),
            as_overhead(start)
        );
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copies_scripts_preserving_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        std::fs::create_dir_all(root.join("src/vendor")).unwrap();
        std::fs::write(root.join("src/main.js"), "console.log(1)").unwrap();
        std::fs::write(root.join("src/vendor/lib.js"), "console.log(2)").unwrap();

        let dest = root.join("dist");
        let work = scripts(format!("{root}/src/**/*.js"), dest.clone());

        work.call(&crate::Environment {
            generator: "millrace",
            mode: crate::Mode::Build,
            port: None,
        })
        .expect("Should copy");

        assert!(dest.join("main.js").is_file());
        assert!(dest.join("vendor/lib.js").is_file());
    }
}
