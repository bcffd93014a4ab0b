//! Parent/child/sibling resolution over the flat node array (spec.md §4.C).
//!
//! Grounded on `ntv2_fix_ptrs` in the original C source. Three passes:
//! parent linking (with a one-shot blank-parent-name repair that re-visits
//! the same record), a parent-chain loop check, then child/sibling linking.
//! Runs again, unchanged, after the extent cropper deactivates records.

use crate::error::Error;
use crate::header::{FixFlags, ALL_BLANKS, NO_PARENT_NAME};
use crate::node::{Node, NodeIndex};

/// Outcome of a successful resolve: how many top-level parents were found
/// and where their chain starts.
#[derive(Debug, Clone, Copy)]
pub struct Topology {
    pub num_parents: usize,
    pub first_top_level: Option<NodeIndex>,
}

/// Re-link `nodes` in place. `fixed` accumulates any blank-parent-name
/// repairs performed along the way.
pub fn resolve(nodes: &mut [Node], fixed: &mut FixFlags) -> Result<Topology, Error> {
    let names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
    let n = nodes.len();

    let mut num_parents = 0usize;
    let mut first_top_level: Option<NodeIndex> = None;
    let mut last_top_level: Option<NodeIndex> = None;

    let mut i = 0;
    while i < n {
        if !nodes[i].active {
            i += 1;
            continue;
        }

        nodes[i].parent = None;
        nodes[i].first_child = None;
        nodes[i].next_sibling = None;

        if nodes[i].parent_name == NO_PARENT_NAME {
            num_parents += 1;
            log::trace!("record {i} ({}) is a top-level parent", nodes[i].name);
            if let Some(last) = last_top_level {
                nodes[last].next_sibling = Some(i);
            } else {
                first_top_level = Some(i);
            }
            last_top_level = Some(i);
            i += 1;
            continue;
        }

        if nodes[i].parent_name == names[i] {
            return Err(Error::InvalidParentName(i));
        }

        let found = (0..n).find(|&j| j != i && nodes[j].active && names[j] == nodes[i].parent_name);

        match found {
            Some(p) => nodes[i].parent = Some(p),
            None if nodes[i].parent_name == ALL_BLANKS => {
                log::warn!("record {i} has a blank parent name, treating as top-level");
                nodes[i].parent_name = NO_PARENT_NAME.to_string();
                *fixed |= FixFlags::BLANK_PARENT_NAME;
                continue;
            }
            None => return Err(Error::ParentNotFound(nodes[i].parent_name.clone())),
        }

        i += 1;
    }

    if first_top_level.is_none() {
        return Err(Error::NoTopLevelParent);
    }

    let max_chain = n - num_parents + 1;
    for i in 0..n {
        if !nodes[i].active {
            continue;
        }
        let mut parent = nodes[i].parent;
        let mut count = 0usize;
        while let Some(p) = parent {
            count += 1;
            if count > max_chain {
                return Err(Error::ParentLoop(i));
            }
            parent = nodes[p].parent;
        }
    }

    for i in 0..n {
        if !nodes[i].active {
            continue;
        }
        let mut first_child = None;
        let mut last_child: Option<NodeIndex> = None;
        for j in 0..n {
            if j == i || !nodes[j].active {
                continue;
            }
            if nodes[j].parent == Some(i) {
                if first_child.is_none() {
                    first_child = Some(j);
                }
                if let Some(last) = last_child {
                    nodes[last].next_sibling = Some(j);
                }
                last_child = Some(j);
            }
        }
        nodes[i].first_child = first_child;
    }

    log::debug!("topology resolved: {num_parents} top-level parent(s) among {n} record(s)");
    Ok(Topology {
        num_parents,
        first_top_level,
    })
}

/// Iterate the top-level parent chain.
pub fn top_level_chain(nodes: &[Node], first: Option<NodeIndex>) -> Vec<NodeIndex> {
    let mut out = Vec::new();
    let mut cur = first;
    while let Some(i) = cur {
        out.push(i);
        cur = nodes[i].next_sibling;
    }
    out
}

/// Iterate the children of `parent`.
pub fn children(nodes: &[Node], parent: NodeIndex) -> Vec<NodeIndex> {
    let mut out = Vec::new();
    let mut cur = nodes[parent].first_child;
    while let Some(i) = cur {
        out.push(i);
        cur = nodes[i].next_sibling;
    }
    out
}
