use std::time::Instant;

use camino::Utf8PathBuf;

use crate::files::{self, FileRecord};
use crate::registry::Work;
use crate::utils::{as_overhead, human_size};

/// Minifies HTML documents matching `source` into `dest`, preserving their
/// layout below the pattern's static prefix.
///
/// The transform strips comments and collapses whitespace runs, dropping
/// them entirely between adjacent tags. Whitespace inside `<pre>` is not
/// treated specially, so pages relying on it should bypass this stage.
pub fn html(source: impl Into<String>, dest: impl Into<Utf8PathBuf>) -> Work {
    let source = source.into();
    let dest = dest.into();

    Work::new(move |_| {
        let start = Instant::now();

        let records = files::read_glob(&source)?;
        let base = files::glob_base(&source);
        let count = records.len();

        let minified: Vec<FileRecord> = records
            .into_iter()
            .map(|record| {
                let text = String::from_utf8_lossy(&record.content);
                FileRecord {
                    path: record.path,
                    content: minify(&text).into_bytes(),
                }
            })
            .collect();

        let total: u64 = minified.iter().map(|r| r.content.len() as u64).sum();
        files::write_records(&minified, &base, &dest)?;

        tracing::info!(
            "html: {count} files, {} {}",
            human_size(total),
            as_overhead(start)
        );
        Ok(())
    })
}

fn minify(input: &str) -> String {
    let stripped = strip_comments(input);

    let mut out = String::with_capacity(stripped.len());
    let mut pending_ws = false;
    let mut last: Option<char> = None;

    for c in stripped.chars() {
        if c.is_whitespace() {
            pending_ws = true;
            continue;
        }

        if pending_ws {
            // Whitespace between two tags carries no content.
            if !(last == Some('>') && c == '<') {
                out.push(' ');
            }
            pending_ws = false;
        }

        out.push(c);
        last = Some(c);
    }

    out
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(i) = rest.find("<!--") {
        out.push_str(&rest[..i]);
        match rest[i..].find("-->") {
            Some(j) => rest = &rest[i + j + 3..],
            None => return out,
        }
    }

    out.push_str(rest);
    out
}
