//! Report-producing validation of the arithmetic/geometric invariants of
//! spec.md §3, separate from the load-time topology resolver (spec.md §4.C).
//!
//! Grounded on `ntv2_validate`/`ntv2_validate_subfile`/`ntv2_overlap` in the
//! original C source. Every failing check is appended as a diagnostic;
//! `ValidationReport::worst` mirrors the source's habit of repeatedly
//! reassigning a single `rc` variable, so it reflects whichever check *last*
//! failed during the pass, not necessarily the most severe one.

use crate::eq::{approx_eq, ge, le};
use crate::error::Error;
use crate::node::Node;
use crate::topology::{self, Topology};

/// Outcome of a [`crate::Grid::validate`] pass: every diagnostic raised, in
/// check order, plus the last (spec.md §7: "the worst") one.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub diagnostics: Vec<Error>,
    pub worst: Option<Error>,
}

impl ValidationReport {
    fn push(&mut self, err: Error) {
        self.diagnostics.push(err.clone_for_report());
        self.worst = Some(err);
    }

    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

// `Error` doesn't derive `Clone` (it wraps `std::io::Error`), but every
// variant validation raises is a plain data variant, so a local helper
// suffices instead of pulling in a full `Clone` impl for every variant.
trait CloneForReport {
    fn clone_for_report(&self) -> Self;
}

impl CloneForReport for Error {
    fn clone_for_report(&self) -> Self {
        use Error::*;
        match self {
            InvalidLatMinMax(i) => InvalidLatMinMax(*i),
            InvalidLonMinMax(i) => InvalidLonMinMax(*i),
            InvalidLatInc(i) => InvalidLatInc(*i),
            InvalidLonInc(i) => InvalidLonInc(*i),
            InvalidDelta(i) => InvalidDelta(*i),
            ParentOverlap(a, b) => ParentOverlap(*a, *b),
            SubfileOverlap(a, b) => SubfileOverlap(*a, *b),
            other => unreachable!("validate never raises {other:?}"),
        }
    }
}

fn overlaps(a: &Node, b: &Node) -> bool {
    !(ge(a.lat_min, b.lat_max) || le(a.lat_max, b.lat_min) || ge(a.lon_min, b.lon_max) || le(a.lon_max, b.lon_min))
}

/// Nearest integer multiple `child_inc * n` of `parent_inc`, and whether it
/// matches within tolerance (spec.md §3's integral-subdivision invariant).
fn is_integer_multiple(parent_inc: f64, child_inc: f64) -> bool {
    let n = (parent_inc / child_inc + 0.5).floor();
    approx_eq(child_inc * n, parent_inc)
}

/// Whether `value` sits on one of `base + n * step` for integer `n`
/// (spec.md §3's "snapped to the parent's grid lines to within ε").
fn on_grid_line(base: f64, step: f64, value: f64) -> bool {
    let n = ((value - base) / step + 0.5).floor();
    approx_eq(base + n * step, value)
}

fn validate_against_parent(nodes: &[Node], i: usize, par: usize, report: &mut ValidationReport) {
    let (child, parent) = (&nodes[i], &nodes[par]);

    if !is_integer_multiple(parent.lat_inc, child.lat_inc) {
        report.push(Error::InvalidLatInc(i));
    }
    if !ge(child.lat_min, parent.lat_min) || !on_grid_line(parent.lat_min, parent.lat_inc, child.lat_min) {
        report.push(Error::InvalidLatMinMax(i));
    }
    if !le(child.lat_max, parent.lat_max) || !on_grid_line(parent.lat_max, -parent.lat_inc, child.lat_max) {
        report.push(Error::InvalidLatMinMax(i));
    }

    if !is_integer_multiple(parent.lon_inc, child.lon_inc) {
        report.push(Error::InvalidLonInc(i));
    }
    if !ge(child.lon_min, parent.lon_min) || !on_grid_line(parent.lon_min, parent.lon_inc, child.lon_min) {
        report.push(Error::InvalidLonMinMax(i));
    }
    if !le(child.lon_max, parent.lon_max) || !on_grid_line(parent.lon_max, -parent.lon_inc, child.lon_max) {
        report.push(Error::InvalidLonMinMax(i));
    }
}

/// Run every geometric/arithmetic check of spec.md §3 over `nodes`,
/// returning a complete report (never short-circuits on the first failure).
pub fn validate(nodes: &[Node], topo: &Topology) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (i, node) in nodes.iter().enumerate() {
        if !node.active {
            continue;
        }

        // Deliberately a raw inequality, not the ε-tolerant `gt`, per
        // spec.md §9's open question: this is the one spot that mirrors the
        // source's `!(rec->lat_inc > 0.0)` literally.
        if !(node.lat_inc > 0.0) {
            report.push(Error::InvalidLatInc(i));
        }
        if !(node.lon_inc > 0.0) {
            report.push(Error::InvalidLonInc(i));
        }

        if node.nrows * node.ncols != node.num {
            report.push(Error::InvalidDelta(i));
        }

        if !crate::eq::lt(node.lat_min, node.lat_max) {
            report.push(Error::InvalidLatMinMax(i));
        }
        if !crate::eq::lt(node.lon_min, node.lon_max) {
            report.push(Error::InvalidLonMinMax(i));
        }

        if let Some(par) = node.parent {
            validate_against_parent(nodes, i, par, &mut report);
        }
    }

    let top_level = topology::top_level_chain(nodes, topo.first_top_level);
    for (a_pos, &a) in top_level.iter().enumerate() {
        for &b in &top_level[a_pos + 1..] {
            if overlaps(&nodes[a], &nodes[b]) {
                report.push(Error::ParentOverlap(a, b));
            }
        }
    }

    for &parent in &top_level {
        check_siblings_overlap(nodes, parent, &mut report);
    }
    // Siblings nested deeper than the top level are checked too: walk every
    // active node once as a potential parent.
    for (i, node) in nodes.iter().enumerate() {
        if node.active && node.first_child.is_some() && !top_level.contains(&i) {
            check_siblings_overlap(nodes, i, &mut report);
        }
    }

    report
}

fn check_siblings_overlap(nodes: &[Node], parent: usize, report: &mut ValidationReport) {
    let children = topology::children(nodes, parent);
    for (a_pos, &a) in children.iter().enumerate() {
        for &b in &children[a_pos + 1..] {
            if overlaps(&nodes[a], &nodes[b]) {
                report.push(Error::SubfileOverlap(a, b));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Data;

    fn node(name: &str, lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64, inc: f64) -> Node {
        Node {
            name: name.to_string(),
            parent_name: "NONE    ".to_string(),
            active: true,
            parent: None,
            first_child: None,
            next_sibling: None,
            lat_min,
            lat_max,
            lat_inc: inc,
            lon_min,
            lon_max,
            lon_inc: inc,
            nrows: ((lat_max - lat_min) / inc) as usize + 1,
            ncols: ((lon_max - lon_min) / inc) as usize + 1,
            num: 0,
            offset: 0,
            wskip: 0,
            eskip: 0,
            sskip: 0,
            nskip: 0,
            data: Data::Lazy,
        }
    }

    #[test]
    fn clean_topology_validates_without_diagnostics() {
        let mut nodes = vec![node("A       ", -10.0, 10.0, -10.0, 10.0, 1.0)];
        nodes[0].num = nodes[0].nrows * nodes[0].ncols;
        let topo = Topology {
            num_parents: 1,
            first_top_level: Some(0),
        };
        let report = validate(&nodes, &topo);
        assert!(report.is_ok());
    }

    #[test]
    fn overlapping_top_level_parents_are_reported() {
        let mut nodes = vec![
            node("A       ", -10.0, 10.0, -10.0, 10.0, 1.0),
            node("B       ", -10.0, 10.0, 5.0, 20.0, 1.0),
        ];
        for n in &mut nodes {
            n.num = n.nrows * n.ncols;
        }
        nodes[0].next_sibling = Some(1);
        let topo = Topology {
            num_parents: 2,
            first_top_level: Some(0),
        };
        let report = validate(&nodes, &topo);
        assert!(matches!(report.worst, Some(Error::ParentOverlap(0, 1))));
    }

    #[test]
    fn child_not_snapped_to_parent_grid_line_is_reported() {
        let mut nodes = vec![
            node("PARENT  ", -10.0, 10.0, -10.0, 10.0, 1.0),
            node("CHILD   ", -2.3, 2.3, -2.3, 2.3, 0.5),
        ];
        for n in &mut nodes {
            n.num = n.nrows * n.ncols;
        }
        nodes[1].parent = Some(0);
        nodes[0].first_child = Some(1);
        let topo = Topology {
            num_parents: 1,
            first_top_level: Some(0),
        };
        let report = validate(&nodes, &topo);
        assert!(!report.is_ok());
    }

    #[test]
    fn non_positive_lat_inc_is_reported() {
        let mut nodes = vec![node("A       ", -10.0, 10.0, -10.0, 10.0, 1.0)];
        nodes[0].lat_inc = 0.0;
        nodes[0].num = nodes[0].nrows * nodes[0].ncols;
        let topo = Topology {
            num_parents: 1,
            first_top_level: Some(0),
        };
        let report = validate(&nodes, &topo);
        assert!(matches!(report.worst, Some(Error::InvalidLatInc(0))));
    }
}
