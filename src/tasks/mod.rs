//! Bundled file transforms.
//!
//! Each helper here builds a [`Work`](crate::Work) unit wrapping an
//! off-the-shelf transform: SCSS compilation through `grass`, raster
//! re-encoding through `image`, and plain string or filesystem glue for the
//! rest. The runner has no opinion on any of this; these are ordinary work
//! units a consumer wires into tasks, and nothing stops a consumer from
//! writing their own instead.

mod assets;
mod html;
#[cfg(feature = "image")]
mod images;
mod scripts;
#[cfg(feature = "grass")]
mod styles;
mod svg;

pub use assets::{clean, copy};
pub use html::html;
#[cfg(feature = "image")]
pub use images::images;
pub use scripts::scripts;
#[cfg(feature = "grass")]
pub use styles::styles;
pub use svg::svg_sprite;
