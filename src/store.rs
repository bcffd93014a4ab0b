//! Lazy/materialised grid-shift data access (spec.md §4.E).
//!
//! Grounded on `ntv2_get_shift_from_file`/`ntv2_get_shift_from_data` in the
//! original C source. A materialised node answers from its in-memory
//! `Vec`; a lazy node seeks into the still-open file under a mutex and
//! reads one 32-bit float. The lazy address is `node.offset +
//! (row*ncols+col)*16 + field_offset` exactly as the original computes it —
//! note this does **not** account for `wskip`/`sskip`/etc, same as the
//! source: those strides are only consulted by the eager reader that
//! walks the file sequentially at load time.
//!
//! Unlike the source (whose lazy accessor swaps its `irow`/`icol`
//! arguments at one call site — spec.md §9's second open question), this
//! module takes `(row, col)` consistently throughout.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use crate::codec::NODE_SIZE;
use crate::error::Error;
use crate::node::{Data, Node};

#[derive(Debug, Clone, Copy)]
enum Field {
    LatShift,
    LonShift,
    LatAccuracy,
    LonAccuracy,
}

impl Field {
    fn byte_offset(self) -> u64 {
        match self {
            Field::LatShift => 0,
            Field::LonShift => 4,
            Field::LatAccuracy => 8,
            Field::LonAccuracy => 12,
        }
    }
}

fn cell_offset(node: &Node, row: usize, col: usize, field: Field) -> u64 {
    node.offset + (row * node.ncols + col) as u64 * NODE_SIZE as u64 + field.byte_offset()
}

/// The still-open source file backing any lazy node, guarded by the single
/// coarse mutex the spec calls for (spec.md §5): the critical section is
/// exactly `{ seek(offset); read(4 bytes); }`.
pub struct LazySource {
    file: Mutex<File>,
    big_endian: bool,
}

impl LazySource {
    pub fn new(file: File, big_endian: bool) -> Self {
        Self {
            file: Mutex::new(file),
            big_endian,
        }
    }

    fn read_f32_at(&self, offset: u64) -> Result<f32, Error> {
        let mut file = self.file.lock().expect("lazy-read mutex poisoned");
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; 4];
        file.read_exact(&mut buf)?;
        Ok(if self.big_endian {
            f32::from_be_bytes(buf)
        } else {
            f32::from_le_bytes(buf)
        })
    }
}

/// Fetch the (lat-shift, lon-shift) pair for cell `(row, col)` of `node`.
pub fn shift(node: &Node, row: usize, col: usize, lazy: Option<&LazySource>) -> Result<(f32, f32), Error> {
    match &node.data {
        Data::Shifts(v) | Data::ShiftsWithAccuracy(v, _) => Ok(v[row * node.ncols + col]),
        Data::Lazy => {
            let source = lazy.ok_or(Error::DataNotRead)?;
            let lat = source.read_f32_at(cell_offset(node, row, col, Field::LatShift))?;
            let lon = source.read_f32_at(cell_offset(node, row, col, Field::LonShift))?;
            Ok((lat, lon))
        }
    }
}

/// Fetch the (lat-accuracy, lon-accuracy) pair for cell `(row, col)` of
/// `node`, if accuracies were retained.
pub fn accuracy(
    node: &Node,
    row: usize,
    col: usize,
    lazy: Option<&LazySource>,
) -> Result<(f32, f32), Error> {
    match &node.data {
        Data::ShiftsWithAccuracy(_, a) => Ok(a[row * node.ncols + col]),
        Data::Shifts(_) => Err(Error::OrigDataNotKept),
        Data::Lazy => {
            let source = lazy.ok_or(Error::DataNotRead)?;
            let lat = source.read_f32_at(cell_offset(node, row, col, Field::LatAccuracy))?;
            let lon = source.read_f32_at(cell_offset(node, row, col, Field::LonAccuracy))?;
            Ok((lat, lon))
        }
    }
}
