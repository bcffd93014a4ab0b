#![doc = include_str!("../README.md")]

pub mod codec;
pub mod eq;
pub mod error;
pub mod extent;
pub mod header;
pub mod interpolate;
pub mod load;
pub mod locate;
pub mod node;
pub mod store;
pub mod topology;
pub mod units;
pub mod validate;
pub mod writer;

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

pub use codec::{Endianness, FileKind};
pub use error::{Error, Result, Severity};
pub use extent::Extent;
pub use header::FixFlags;
pub use units::Unit;
pub use validate::ValidationReport;

use header::{OverviewRaw, SubfileRaw};
use node::Node;
use store::LazySource;
use topology::Topology;

/// Options controlling how a file is loaded (spec.md §4.A/§4.B, §4.D).
///
/// Replaces `ntv2_load_file`'s four positional parameters
/// (`keep_orig, read_data, convert_data, extent`) with named fields.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Retain the raw overview/sub-file records, verbatim. Required to
    /// later [`Grid::write`] the grid back out.
    pub keep_orig: bool,
    /// Materialise every sub-file's shift (and, with `keep_orig`, accuracy)
    /// data up front instead of leaving it for the lazy store.
    pub read_data: bool,
    /// Reserved: data is always converted to degrees at query time by
    /// [`interpolate::shift_at`] regardless of this flag, so it currently
    /// has no effect. Kept for parity with `ntv2_load_file`'s signature.
    pub convert_data: bool,
    /// Crop to this extent as part of the load, before topology is handed
    /// back to the caller.
    pub extent: Option<Extent>,
}

/// Options controlling how a grid is serialised (spec.md §4.H).
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub kind: FileKind,
    pub endianness: Endianness,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            kind: FileKind::Binary,
            endianness: Endianness::Native,
        }
    }
}

/// Overall bounding box across every active sub-file, in degrees, standard
/// sign convention (spec.md §3's "top-level header ... overall extrema").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrema {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

fn compute_extrema(nodes: &[Node]) -> Option<Extrema> {
    let mut iter = nodes.iter().filter(|n| n.active);
    let first = iter.next()?;
    let mut ex = Extrema {
        lon_min: first.lon_min,
        lon_max: first.lon_max,
        lat_min: first.lat_min,
        lat_max: first.lat_max,
    };
    for n in iter {
        ex.lon_min = ex.lon_min.min(n.lon_min);
        ex.lon_max = ex.lon_max.max(n.lon_max);
        ex.lat_min = ex.lat_min.min(n.lat_min);
        ex.lat_max = ex.lat_max.max(n.lat_max);
    }
    Some(ex)
}

/// A loaded NTv2 grid-shift file: the top-level header plus the flat node
/// array (spec.md §3's "top-level header").
pub struct Grid {
    path: Option<PathBuf>,
    kind: FileKind,
    keep_orig: bool,
    unit: Unit,
    fixed: FixFlags,
    nodes: Vec<Node>,
    topo: Topology,
    overview: Option<OverviewRaw>,
    subfile_raw: Vec<Option<SubfileRaw>>,
    big_endian: Option<bool>,
    #[allow(dead_code)]
    pads_present: bool,
    lazy: Option<LazySource>,
    extrema: Extrema,
}

impl Grid {
    fn assemble(
        kind: FileKind,
        mut loaded: load::Loaded,
        opts: &LoadOptions,
        path: Option<PathBuf>,
        lazy: Option<LazySource>,
    ) -> Result<Grid> {
        let mut topo = topology::resolve(&mut loaded.nodes, &mut loaded.fixed)?;
        if let Some(extent) = opts.extent {
            topo = extent::apply(&mut loaded.nodes, extent, topo, &mut loaded.fixed)?;
        }
        let extrema = compute_extrema(&loaded.nodes).ok_or(Error::NoTopLevelParent)?;

        let (overview, subfile_raw) = if opts.keep_orig {
            (Some(loaded.overview), loaded.subfile_raw)
        } else {
            (None, Vec::new())
        };

        log::debug!(
            "loaded {kind:?} grid with {} record(s), {} top-level parent(s)",
            loaded.nodes.len(),
            topo.num_parents
        );

        Ok(Grid {
            path,
            kind,
            keep_orig: opts.keep_orig,
            unit: loaded.unit,
            fixed: loaded.fixed,
            nodes: loaded.nodes,
            topo,
            overview,
            subfile_raw,
            big_endian: loaded.big_endian,
            pads_present: loaded.pads_present,
            lazy,
            extrema,
        })
    }

    /// Load a grid from a file on disk. The file extension (`.gsb`/`.gsa`)
    /// determines which codec is used.
    pub fn load<P: AsRef<Path>>(path: P, opts: LoadOptions) -> Result<Grid> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::NullPath);
        }
        let kind = FileKind::from_extension(path).ok_or(Error::UnknownFileType)?;

        let mut file = File::open(path).map_err(|_| Error::CannotOpen(path.display().to_string()))?;
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut buf)?;

        let (loaded, lazy) = match kind {
            FileKind::Binary => {
                let loaded = load::load_binary(&buf, opts.read_data, opts.keep_orig)?;
                let lazy = if opts.read_data {
                    None
                } else {
                    Some(LazySource::new(
                        File::open(path).map_err(|_| Error::CannotOpen(path.display().to_string()))?,
                        loaded.big_endian.unwrap_or(cfg!(target_endian = "big")),
                    ))
                };
                (loaded, lazy)
            }
            FileKind::Ascii => {
                let text = std::str::from_utf8(&buf)?;
                (load::load_ascii(text, opts.keep_orig)?, None)
            }
        };

        Grid::assemble(kind, loaded, &opts, Some(path.to_path_buf()), lazy)
    }

    /// Load a grid from an in-memory buffer. There is no file handle to
    /// keep open afterwards, so data is always read eagerly regardless of
    /// `opts.read_data`.
    pub fn load_bytes(buf: &[u8], kind: FileKind, opts: LoadOptions) -> Result<Grid> {
        let loaded = match kind {
            FileKind::Binary => load::load_binary(buf, true, opts.keep_orig)?,
            FileKind::Ascii => load::load_ascii(std::str::from_utf8(buf)?, opts.keep_orig)?,
        };
        Grid::assemble(kind, loaded, &opts, None, None)
    }

    /// Path the grid was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Which of the two file variants this grid was loaded from.
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// The unit the file's header fields were stored in.
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Cosmetic fixes applied while loading (spec.md §4.B, §7).
    pub fn fixed(&self) -> FixFlags {
        self.fixed
    }

    /// Overall bounding box across every active sub-file, in degrees.
    pub fn extrema(&self) -> Extrema {
        self.extrema
    }

    /// Number of active sub-file records.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.active).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the geometric/arithmetic validation pass of spec.md §3/§7.
    pub fn validate(&self) -> ValidationReport {
        validate::validate(&self.nodes, &self.topo)
    }

    /// Crop an already-loaded grid to `extent` (spec.md §4.D), usable
    /// standalone from load-time cropping.
    pub fn crop(&mut self, extent: Extent) -> Result<()> {
        self.topo = extent::apply(&mut self.nodes, extent, self.topo, &mut self.fixed)?;
        self.extrema = compute_extrema(&self.nodes).ok_or(Error::InvalidExtent)?;
        Ok(())
    }

    /// Locate `(lon, lat)` and return the node index and edge/corner status
    /// found, exercising the locator independently of a full transform.
    #[cfg(test)]
    pub fn locate_for_test(&self, lon: f64, lat: f64) -> locate::Located {
        locate::locate(&self.nodes, self.topo.first_top_level, lon, lat)
    }

    fn shift_at(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let located = locate::locate(&self.nodes, self.topo.first_top_level, lon, lat);
        let idx = located.node?;
        interpolate::shift_at(&self.nodes[idx], self.unit, lon, lat, &located, self.lazy.as_ref()).ok()
    }

    /// Apply the forward transform to every `(lon, lat)` pair in `points`,
    /// in place, in degrees. `deg_factor` converts an input unit other than
    /// degrees to degrees (non-positive values are clamped to `1.0`,
    /// mirroring `ntv2_forward`); pass `1.0` for already-degree input.
    /// Points that cannot be located are left unchanged. Returns the number
    /// of points actually shifted.
    pub fn forward_scaled(&self, points: &mut [(f64, f64)], deg_factor: f64) -> usize {
        let factor = if deg_factor > 0.0 { deg_factor } else { 1.0 };
        let mut count = 0;
        for p in points.iter_mut() {
            let lon = p.0 * factor;
            let lat = p.1 * factor;
            if let Some((dlon, dlat)) = self.shift_at(lon, lat) {
                p.0 = (lon + dlon) / factor;
                p.1 = (lat + dlat) / factor;
                count += 1;
            }
        }
        count
    }

    /// Apply the forward transform to every `(lon, lat)` pair in `points`,
    /// in place, in degrees. Points that cannot be located are left
    /// unchanged. Returns the number of points actually shifted.
    pub fn forward(&self, points: &mut [(f64, f64)]) -> usize {
        self.forward_scaled(points, 1.0)
    }

    /// Apply the inverse transform to every `(lon, lat)` pair in `points`,
    /// in place, in degrees, by fixed-point iteration (spec.md §4.G).
    /// `deg_factor` is as in [`Grid::forward_scaled`].
    pub fn inverse_scaled(&self, points: &mut [(f64, f64)], deg_factor: f64) -> usize {
        let factor = if deg_factor > 0.0 { deg_factor } else { 1.0 };
        let mut count = 0;
        for p in points.iter_mut() {
            let original = (p.0 * factor, p.1 * factor);
            let mut estimate = original;
            let mut ran = false;

            for _ in 0..interpolate::MAX_ITERATIONS {
                let Some((dlon, dlat)) = self.shift_at(estimate.0, estimate.1) else {
                    break;
                };
                ran = true;
                let next = (original.0 - dlon, original.1 - dlat);
                let converged = interpolate::converged(next.0 - estimate.0, next.1 - estimate.1);
                estimate = next;
                if converged {
                    break;
                }
            }

            if ran {
                p.0 = estimate.0 / factor;
                p.1 = estimate.1 / factor;
                count += 1;
            }
        }
        count
    }

    /// Apply the inverse transform to every `(lon, lat)` pair in `points`,
    /// in place, in degrees. Returns the number of points actually shifted.
    pub fn inverse(&self, points: &mut [(f64, f64)]) -> usize {
        self.inverse_scaled(points, 1.0)
    }

    fn write_to_bytes(&self, opts: WriteOptions) -> Result<Vec<u8>> {
        let overview = self.overview.as_ref().ok_or(Error::OrigDataNotKept)?;
        match opts.kind {
            FileKind::Binary => {
                let big_endian = opts.endianness.resolve(self.big_endian);
                writer::write_binary(
                    &self.nodes,
                    &self.topo,
                    overview,
                    &self.subfile_raw,
                    self.unit,
                    self.keep_orig,
                    big_endian,
                )
            }
            FileKind::Ascii => writer::write_ascii(
                &self.nodes,
                &self.topo,
                overview,
                &self.subfile_raw,
                self.unit,
                self.keep_orig,
            )
            .map(String::into_bytes),
        }
    }

    /// Serialise the grid to an in-memory buffer.
    pub fn write_bytes(&self, opts: WriteOptions) -> Result<Vec<u8>> {
        self.write_to_bytes(opts)
    }

    /// Serialise the grid to a file on disk.
    pub fn write<P: AsRef<Path>>(&self, path: P, opts: WriteOptions) -> Result<()> {
        let bytes = self.write_to_bytes(opts)?;
        let mut file =
            File::create(path.as_ref()).map_err(|_| Error::CannotOpen(path.as_ref().display().to_string()))?;
        file.write_all(&bytes)?;
        Ok(())
    }
}
