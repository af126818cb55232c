//! Relationship graph search over resolved entities.

use std::collections::{BTreeMap, BTreeSet};

use crate::record::EntityId;

pub(crate) type Adjacency = BTreeMap<EntityId, BTreeSet<EntityId>>;

/// Parameters of one path search.
pub(crate) struct PathQuery<'a> {
    pub start: EntityId,
    pub end: EntityId,
    pub max_degrees: u32,
    pub avoid: &'a BTreeSet<EntityId>,
    pub strict_avoid: bool,
    /// Entities that satisfy the required-source constraint, if any.
    pub qualifying: Option<&'a BTreeSet<EntityId>>,
}

/// Best path for `query`, or `None` when no admissible path exists.
///
/// Candidates are all simple paths within the degree limit. Required sources
/// and strict avoidance filter them; the rest are ranked by how many avoided
/// entities they route through, then by length, then by id order.
pub(crate) fn find_path(adjacency: &Adjacency, query: &PathQuery<'_>) -> Option<Vec<EntityId>> {
    if query.start == query.end {
        return Some(vec![query.start]);
    }

    let mut candidates = Vec::new();
    let mut chain = vec![query.start];
    walk(adjacency, query, &mut chain, &mut candidates);

    candidates
        .into_iter()
        .filter(|path| admissible(path, query))
        .min_by(|a, b| {
            let rank = |p: &Vec<EntityId>| (avoided_count(p, query.avoid), p.len());
            rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
        })
}

fn walk(
    adjacency: &Adjacency,
    query: &PathQuery<'_>,
    chain: &mut Vec<EntityId>,
    out: &mut Vec<Vec<EntityId>>,
) {
    let Some(&current) = chain.last() else {
        return;
    };
    if current == query.end {
        out.push(chain.clone());
        return;
    }
    if chain.len() > query.max_degrees as usize {
        return;
    }
    let Some(neighbors) = adjacency.get(&current) else {
        return;
    };
    for &next in neighbors {
        if chain.contains(&next) {
            continue;
        }
        chain.push(next);
        walk(adjacency, query, chain, out);
        chain.pop();
    }
}

fn intermediates(path: &[EntityId]) -> &[EntityId] {
    if path.len() > 2 {
        &path[1..path.len() - 1]
    } else {
        &[]
    }
}

fn avoided_count(path: &[EntityId], avoid: &BTreeSet<EntityId>) -> usize {
    intermediates(path).iter().filter(|id| avoid.contains(id)).count()
}

fn admissible(path: &[EntityId], query: &PathQuery<'_>) -> bool {
    if query.strict_avoid && avoided_count(path, query.avoid) > 0 {
        return false;
    }
    match query.qualifying {
        Some(qualifying) => intermediates(path).iter().any(|id| qualifying.contains(id)),
        None => true,
    }
}

/// Entities within `degrees` hops of `seeds`, excluding the seeds, capped at
/// `max_entities`. Nearer entities are added first, in id order per level.
pub(crate) fn build_out(
    adjacency: &Adjacency,
    seeds: &BTreeSet<EntityId>,
    degrees: u32,
    max_entities: usize,
) -> BTreeSet<EntityId> {
    let mut added = BTreeSet::new();
    let mut frontier: BTreeSet<EntityId> = seeds.clone();
    for _ in 0..degrees {
        let mut next = BTreeSet::new();
        for id in &frontier {
            let Some(neighbors) = adjacency.get(id) else {
                continue;
            };
            for &n in neighbors {
                if !seeds.contains(&n) && !added.contains(&n) {
                    next.insert(n);
                }
            }
        }
        for &id in &next {
            if added.len() >= max_entities {
                return added;
            }
            added.insert(id);
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    added
}
