use std::time::Instant;

use camino::Utf8PathBuf;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::files;
use crate::registry::Work;
use crate::utils::{as_overhead, human_size};

/// Re-encodes raster images matching `source` as lossless WebP into `dest`.
///
/// Decoding and encoding are delegated entirely to the `image` crate; this
/// stage just feeds it. Output names keep the source stem with a `.webp`
/// extension.
pub fn images(source: impl Into<String>, dest: impl Into<Utf8PathBuf>) -> Work {
    let source = source.into();
    let dest = dest.into();

    Work::new(move |_| {
        let start = Instant::now();

        let records = files::read_glob(&source)?;
        let count = records.len();

        let total: u64 = records
            .into_par_iter()
            .map(|record| -> anyhow::Result<u64> {
                let buffer = optimize_image(&record.content)?;

                let name = record.path.file_name().unwrap_or("image");
                let out = dest.join(name).with_extension("webp");
                files::write_if_changed(&out, &buffer)?;

                Ok(buffer.len() as u64)
            })
            .try_reduce(|| 0, |a, b| Ok(a + b))?;

        tracing::info!(
            "images: {count} files, {} {}",
            human_size(total),
            as_overhead(start)
        );
        Ok(())
    })
}

fn optimize_image(buffer: &[u8]) -> anyhow::Result<Vec<u8>> {
    let img = image::load_from_memory(buffer)?;
    let dim = (img.width(), img.height());

    let mut out = Vec::new();
    let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut out);
    encoder.encode(&img.to_rgba8(), dim.0, dim.1, image::ExtendedColorType::Rgba8)?;

    Ok(out)
}
