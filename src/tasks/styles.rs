use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};

use crate::files;
use crate::registry::Work;
use crate::utils::{as_overhead, human_size};

/// Compiles every SCSS entry point matching `source` into `dest`.
///
/// Partials (file names starting with `_`) are skipped as entries; `grass`
/// pulls them in through `@use`/`@import` where referenced. Output files
/// keep their stem with a `.css` extension, and identical output is not
/// rewritten, so a no-op rebuild doesn't dirty the destination.
pub fn styles(source: impl Into<String>, dest: impl Into<Utf8PathBuf>) -> Work {
    let source = source.into();
    let dest = dest.into();

    Work::new(move |_| {
        let start = Instant::now();

        let mut paths = Vec::new();
        for entry in glob::glob(&source)? {
            let path = Utf8PathBuf::try_from(entry?)?;
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut count = 0usize;
        let mut total = 0u64;

        for path in paths {
            if is_partial(&path) {
                continue;
            }

            let css = grass::from_path(&path, &grass::Options::default())?;

            let name = path.file_name().unwrap_or("style");
            let out = dest.join(name).with_extension("css");
            files::write_if_changed(&out, css.as_bytes())?;

            count += 1;
            total += css.len() as u64;
        }

        tracing::info!(
            "styles: {count} files, {} {}",
            human_size(total),
            as_overhead(start)
        );
        Ok(())
    })
}

fn is_partial(path: &Utf8Path) -> bool {
    path.file_name().is_some_and(|name| name.starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partials_are_not_entries() {
        assert!(is_partial(Utf8Path::new("app/styles/_mixins.scss")));
        assert!(!is_partial(Utf8Path::new("app/styles/main.scss")));
    }

    #[test]
    fn test_compiles_entry_and_skips_partial() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        std::fs::write(root.join("main.scss"), "$c: red;\nbody { color: $c; }").unwrap();
        std::fs::write(root.join("_ignore.scss"), "broken {{{{").unwrap();

        let dest = root.join("out");
        let work = styles(format!("{root}/*.scss"), dest.clone());

        work.call(&crate::Environment {
            generator: "millrace",
            mode: crate::Mode::Build,
            port: None,
        })
        .expect("Should compile");

        let css = std::fs::read_to_string(dest.join("main.css")).unwrap();
        assert!(css.contains("color: red"));
        assert!(!dest.join("_ignore.css").exists());
    }
}
