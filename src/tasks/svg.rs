use std::time::Instant;

use camino::Utf8PathBuf;

use crate::files;
use crate::registry::Work;
use crate::utils::{as_overhead, human_size};

/// Combines SVG icons matching `source` into a single hidden sprite sheet
/// at `dest_file`, one `<symbol>` per icon.
///
/// Each icon's id is its file stem with `prefix` prepended, so
/// `menu.svg` with prefix `icon-` is referenced as `#icon-menu`. Icons the
/// parser cannot make sense of are skipped with a warning rather than
/// failing the whole sprite.
pub fn svg_sprite(
    source: impl Into<String>,
    dest_file: impl Into<Utf8PathBuf>,
    prefix: impl Into<String>,
) -> Work {
    let source = source.into();
    let dest_file = dest_file.into();
    let prefix = prefix.into();

    Work::new(move |_| {
        let start = Instant::now();

        let records = files::read_glob(&source)?;
        let count = records.len();

        let mut symbols = String::new();
        for record in &records {
            let stem = record.path.file_stem().unwrap_or_default();
            let id = format!("{prefix}{stem}");
            let content = String::from_utf8_lossy(&record.content);

            match to_symbol(&id, &content) {
                Some(symbol) => symbols.push_str(&symbol),
                None => tracing::warn!("skipping malformed svg: {}", record.path),
            }
        }

        let sprite = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" style="display:none">{symbols}</svg>"#
        );
        files::write_if_changed(&dest_file, sprite.as_bytes())?;

        tracing::info!(
            "svg: {count} icons, {} {}",
            human_size(sprite.len() as u64),
            as_overhead(start)
        );
        Ok(())
    })
}

/// Rewraps a standalone `<svg>` document as a `<symbol>`, carrying over the
/// viewBox when present. Returns `None` for input without an svg element.
fn to_symbol(id: &str, svg: &str) -> Option<String> {
    let open_start = svg.find("<svg")?;
    let open_end = open_start + svg[open_start..].find('>')?;
    let close = svg.rfind("</svg>")?;
    if close < open_end {
        return None;
    }

    let attrs = &svg[open_start + 4..open_end];
    let body = &svg[open_end + 1..close];

    let view_box = attrs.find("viewBox=\"").and_then(|i| {
        let rest = &attrs[i + 9..];
        rest.find('"').map(|j| &rest[..j])
    });

    Some(match view_box {
        Some(vb) => format!(r#"<symbol id="{id}" viewBox="{vb}">{body}</symbol>"#),
        None => format!(r#"<symbol id="{id}">{body}</symbol>"#),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_carries_viewbox() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path d="M0 0"/></svg>"#;

        let symbol = to_symbol("icon-menu", svg).expect("Should convert");
        assert_eq!(
            symbol,
            r#"<symbol id="icon-menu" viewBox="0 0 24 24"><path d="M0 0"/></symbol>"#
        );
    }

    #[test]
    fn test_symbol_without_viewbox() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><circle r="4"/></svg>"#;

        let symbol = to_symbol("icon-dot", svg).expect("Should convert");
        assert_eq!(symbol, r#"<symbol id="icon-dot"><circle r="4"/></symbol>"#);
    }

    #[test]
    fn test_not_an_svg() {
        assert!(to_symbol("icon-x", "<html></html>").is_none());
        assert!(to_symbol("icon-x", "").is_none());
    }

    #[test]
    fn test_sprite_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        std::fs::write(
            root.join("menu.svg"),
            r#"<svg viewBox="0 0 24 24"><path d="M1 1"/></svg>"#,
        )
        .unwrap();
        std::fs::write(
            root.join("close.svg"),
            r#"<svg viewBox="0 0 16 16"><path d="M2 2"/></svg>"#,
        )
        .unwrap();

        let out = root.join("sprite.svg");
        let work = svg_sprite(format!("{root}/*.svg"), out.clone(), "icon-");

        work.call(&crate::Environment {
            generator: "millrace",
            mode: crate::Mode::Build,
            port: None,
        })
        .expect("Should build sprite");

        let sprite = std::fs::read_to_string(&out).unwrap();
        // Records are sorted by path, so close comes before menu.
        assert!(sprite.contains(r#"<symbol id="icon-close" viewBox="0 0 16 16">"#));
        assert!(sprite.contains(r#"<symbol id="icon-menu" viewBox="0 0 24 24">"#));
        assert!(sprite.starts_with("<svg"));
    }
}
