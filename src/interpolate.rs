//! Bilinear interpolation with halo rules, and the Newton-style inverse
//! iteration (spec.md §4.G).
//!
//! Grounded on `ntv2_calculate_one_shift`/`ntv2_calculate_shifts` in the
//! original C source. The corner-fetch switch mirrors the source's `switch
//! (status)` block verbatim (including the `OUTSIDE_CELL` zero-out-the-far-
//! half trick); the quadrant addressing uses `(row, col)` consistently
//! rather than the source's swapped-argument accessor (spec.md §9's second
//! open question — see `crate::store`'s module docs).

use crate::eq::approx_eq;
use crate::error::Error;
use crate::locate::{Located, Status};
use crate::node::Node;
use crate::store::LazySource;
use crate::units::Unit;

/// Maximum number of fixed-point iterations the inverse transform will run
/// before accepting its last estimate (spec.md §4.G).
pub const MAX_ITERATIONS: usize = 50;

#[derive(Debug, Clone, Copy, Default)]
struct Corner {
    lat: f64,
    lon: f64,
}

fn corner(node: &Node, row: usize, col: usize, lazy: Option<&LazySource>) -> Result<Corner, Error> {
    let (lat, lon) = crate::store::shift(node, row, col, lazy)?;
    Ok(Corner {
        lat: lat as f64,
        lon: lon as f64,
    })
}

/// Fetch the four cell-corner shifts under the halo rule for `status`,
/// returning `(lower_right, lower_left, upper_right, upper_left)`.
fn corners(
    node: &Node,
    status: Status,
    irow: usize,
    icol: usize,
    horz: i8,
    vert: i8,
    lazy: Option<&LazySource>,
) -> Result<(Corner, Corner, Corner, Corner), Error> {
    let zero = Corner::default();

    Ok(match status {
        Status::Contained => {
            let lr = corner(node, irow, icol, lazy)?;
            let ll = corner(node, irow, icol + 1, lazy)?;
            let ur = corner(node, irow + 1, icol, lazy)?;
            let ul = corner(node, irow + 1, icol + 1, lazy)?;
            (lr, ll, ur, ul)
        }
        Status::North => {
            let lr = corner(node, irow, icol, lazy)?;
            let ll = corner(node, irow, icol + 1, lazy)?;
            (lr, ll, lr, ll)
        }
        Status::West => {
            let lr = corner(node, irow, icol, lazy)?;
            let ur = corner(node, irow + 1, icol, lazy)?;
            (lr, lr, ur, ur)
        }
        Status::NorthWest => {
            let lr = corner(node, irow, icol, lazy)?;
            (lr, lr, lr, lr)
        }
        Status::OutsideCell => {
            let mut lr = corner(node, irow, icol, lazy)?;
            let mut ll = corner(node, irow, icol + 1, lazy)?;
            let mut ur = corner(node, irow + 1, icol, lazy)?;
            let mut ul = corner(node, irow + 1, icol + 1, lazy)?;

            if horz == -1 {
                lr = ll;
                ur = ul;
                ll = zero;
                ul = zero;
            }
            if horz == 1 {
                ll = lr;
                ul = ur;
                ur = zero;
                lr = zero;
            }
            if vert == -1 {
                ul = ll;
                ur = lr;
                ll = zero;
                lr = zero;
            }
            if vert == 1 {
                ll = ul;
                lr = ur;
                ul = zero;
                ur = zero;
            }
            (lr, ll, ur, ul)
        }
        Status::NotFound => (zero, zero, zero, zero),
    })
}

fn bilinear(lr: f64, ll: f64, ur: f64, ul: f64, xf: f64, yf: f64) -> f64 {
    let b = ll - lr;
    let c = ur - lr;
    let d = (ul - ll) - (ur - lr);
    lr + b * xf + c * yf + d * xf * yf
}

/// The (lon, lat) shift, in degrees, standard sign convention, at a point
/// already located within `node` under `located`.
pub fn shift_at(
    node: &Node,
    unit: Unit,
    lon: f64,
    lat: f64,
    located: &Located,
    lazy: Option<&LazySource>,
) -> Result<(f64, f64), Error> {
    let status = located.status;

    let x_frac_index = (node.lon_max - lon) / node.lon_inc;
    let y_frac_index = (lat - node.lat_min) / node.lat_inc;

    let mut icol = x_frac_index.floor() as isize;
    let mut irow = y_frac_index.floor() as isize;
    let xf = x_frac_index - icol as f64;
    let yf = y_frac_index - irow as f64;

    if status == Status::OutsideCell {
        icol = icol.clamp(0, node.ncols as isize - 2);
        irow = irow.clamp(0, node.nrows as isize - 2);
    }
    let icol = icol.max(0) as usize;
    let irow = irow.max(0) as usize;

    let (lr, ll, ur, ul) = corners(node, status, irow, icol, located.horz, located.vert, lazy)?;

    let data_conv = unit.data_conversion();
    let lat_shift = bilinear(lr.lat, ll.lat, ur.lat, ul.lat, xf, yf) * data_conv / 3600.0;
    let lon_shift = bilinear(lr.lon, ll.lon, ur.lon, ul.lon, xf, yf) * data_conv / 3600.0;

    // The file's longitude shifts are built for positive-west values; flip
    // back to the standard positive-east sign.
    Ok((-lon_shift, lat_shift))
}

/// Both coordinate deltas are within `eq::EPS` of zero (spec.md §4.G: the
/// inverse loop's stopping condition).
pub fn converged(lon_delta: f64, lat_delta: f64) -> bool {
    approx_eq(lon_delta, 0.0) && approx_eq(lat_delta, 0.0)
}
