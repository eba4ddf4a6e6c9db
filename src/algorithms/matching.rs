//! Matching-based graph contraction.
//!
//! One pass over a seeded random permutation groups the vertices into
//! singletons, pairs and triples; a second pass numbers the groups and
//! accumulates the coarse graph. Groups are cyclic lists threaded through
//! `matching`, the fine-to-coarse map is `matchmap`, and `invmatchmap` keeps
//! one representative (the lowest vertex id) per coarse vertex.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;
use sprs::CsMat;

use crate::graph::Graph;
use crate::options::{MatchingStrategy, Options};

/// How a vertex ended up in its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchType {
    /// No partner was available; the vertex is its own coarse vertex.
    Orphan,
    /// An ordinary two-vertex match.
    Standard,
    /// Joined an adjacent pair through the edge-weight ratio test.
    Brotherly,
    /// Joined the pair of its heaviest neighbor after being stranded.
    Community,
}

/// The grouping produced for one coarsening level.
pub(crate) struct Matching {
    /// Next vertex in the cyclic group (identity for singletons).
    pub matching: Vec<usize>,
    /// Coarse vertex id of each fine vertex.
    pub matchmap: Vec<usize>,
    /// Representative fine vertex of each coarse vertex.
    pub invmatchmap: Vec<usize>,
    /// Classification of each fine vertex.
    pub matchtype: Vec<MatchType>,
    /// Number of coarse vertices.
    pub cn: usize,
}

/// Match the vertices of `graph` and build the contracted graph.
pub(crate) fn match_and_coarsen(
    graph: &Graph,
    options: &Options,
    rng: &mut SmallRng,
) -> (Matching, Graph) {
    let matching = match_vertices(graph, options, rng);
    let orphans = matching
        .matchtype
        .iter()
        .filter(|t| **t == MatchType::Orphan)
        .count();
    log::trace!(
        "matched {} vertices into {} groups ({orphans} orphans)",
        graph.len(),
        matching.cn
    );
    let coarse = contract(graph, &matching);
    (matching, coarse)
}

fn match_vertices(graph: &Graph, options: &Options, rng: &mut SmallRng) -> Matching {
    let n = graph.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut matching: Vec<usize> = (0..n).collect();
    let mut matchtype = vec![MatchType::Orphan; n];
    let mut matched = vec![false; n];

    for &v in &order {
        if matched[v] {
            continue;
        }
        let partner = match options.matching_strategy {
            MatchingStrategy::Random => random_unmatched(graph, v, &matched, rng),
            _ => heaviest_unmatched(graph, v, &matched),
        };
        match partner {
            Some(u) => {
                matched[v] = true;
                matched[u] = true;
                matching[v] = u;
                matching[u] = v;
                matchtype[v] = MatchType::Standard;
                matchtype[u] = MatchType::Standard;
            }
            None => {
                // Every neighbor is taken. Depending on the strategy the
                // vertex may still squeeze into an adjacent pair; otherwise
                // it stays a lone coarse vertex.
                matched[v] = true;
                match options.matching_strategy {
                    MatchingStrategy::HeavyEdgeBrotherly => {
                        if !join_brotherly(graph, options, v, &mut matching, &mut matchtype)
                            && options.do_community_matching
                        {
                            join_community(graph, v, &mut matching, &mut matchtype);
                        }
                    }
                    MatchingStrategy::HeavyEdgeCommunity => {
                        if options.do_community_matching {
                            join_community(graph, v, &mut matching, &mut matchtype);
                        }
                    }
                    MatchingStrategy::Random | MatchingStrategy::HeavyEdge => {}
                }
            }
        }
    }

    // Number the groups: scanning in id order makes the first group member
    // reached its representative, and representatives receive consecutive
    // coarse ids.
    let mut matchmap = vec![usize::MAX; n];
    let mut invmatchmap = Vec::new();
    let mut cn = 0;
    for v in 0..n {
        if matchmap[v] != usize::MAX {
            continue;
        }
        invmatchmap.push(v);
        let mut u = v;
        loop {
            matchmap[u] = cn;
            u = matching[u];
            if u == v {
                break;
            }
        }
        cn += 1;
    }

    Matching { matching, matchmap, invmatchmap, matchtype, cn }
}

fn random_unmatched(
    graph: &Graph,
    v: usize,
    matched: &[bool],
    rng: &mut SmallRng,
) -> Option<usize> {
    let candidates: Vec<usize> = graph
        .neighbors(v)
        .filter(|&(u, _)| !matched[u])
        .map(|(u, _)| u)
        .collect();
    if candidates.is_empty() {
        None
    } else {
        Some(candidates[rng.gen_range(0..candidates.len())])
    }
}

/// Heaviest unmatched neighbor; ties break toward the lower vertex id (the
/// neighbor list is sorted, so strict comparison suffices).
fn heaviest_unmatched(graph: &Graph, v: usize, matched: &[bool]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (u, x) in graph.neighbors(v) {
        if matched[u] {
            continue;
        }
        if best.map_or(true, |(_, bx)| x > bx) {
            best = Some((u, x));
        }
    }
    best.map(|(u, _)| u)
}

/// Length of the cyclic group containing `u` is exactly two.
fn is_pair(matching: &[usize], u: usize) -> bool {
    matching[u] != u && matching[matching[u]] == u
}

/// Insert `v` into the pair containing `m`.
fn grow_pair(matching: &mut [usize], m: usize, v: usize) {
    matching[v] = matching[m];
    matching[m] = v;
}

/// A stranded vertex joins the pair of its heaviest pair-matched neighbor.
fn join_community(
    graph: &Graph,
    v: usize,
    matching: &mut [usize],
    matchtype: &mut [MatchType],
) -> bool {
    let mut best: Option<(usize, f64)> = None;
    for (u, x) in graph.neighbors(v) {
        if is_pair(matching, u) && best.map_or(true, |(_, bx)| x > bx) {
            best = Some((u, x));
        }
    }
    match best {
        Some((m, _)) => {
            grow_pair(matching, m, v);
            matchtype[v] = MatchType::Community;
            true
        }
        None => false,
    }
}

/// A stranded vertex joins an adjacent pair only when the connecting edge is
/// within the brotherly ratio of its heaviest incident edge.
fn join_brotherly(
    graph: &Graph,
    options: &Options,
    v: usize,
    matching: &mut [usize],
    matchtype: &mut [MatchType],
) -> bool {
    let heaviest = graph.neighbors(v).fold(0.0f64, |m, (_, x)| m.max(x));
    let mut best: Option<(usize, f64)> = None;
    for (u, x) in graph.neighbors(v) {
        if is_pair(matching, u)
            && options.davis_brotherly_threshold * x >= heaviest
            && best.map_or(true, |(_, bx)| x > bx)
        {
            best = Some((u, x));
        }
    }
    match best {
        Some((m, _)) => {
            grow_pair(matching, m, v);
            matchtype[v] = MatchType::Brotherly;
            true
        }
        None => false,
    }
}

/// Accumulate the coarse graph: group weights add up, and every fine edge
/// between different groups folds into one coarse edge. A dense scatter
/// array coalesces parallel edges in O(nz) overall.
fn contract(graph: &Graph, matching: &Matching) -> Graph {
    let cn = matching.cn;
    let mut coarse_weights = vec![0.0; cn];
    let mut indptr = Vec::with_capacity(cn + 1);
    let mut indices: Vec<usize> = Vec::new();
    let mut data: Vec<f64> = Vec::new();
    indptr.push(0);

    // scatter_mark[c] == current row means the coarse edge already has a
    // slot at scatter_slot[c].
    let mut scatter_mark = vec![usize::MAX; cn];
    let mut scatter_slot = vec![0usize; cn];

    for c in 0..cn {
        let row_start = indices.len();
        let representative = matching.invmatchmap[c];
        let mut v = representative;
        loop {
            coarse_weights[c] += graph.vertex_weights()[v];
            for (u, x) in graph.neighbors(v) {
                let cu = matching.matchmap[u];
                if cu == c {
                    continue;
                }
                if scatter_mark[cu] == c {
                    data[scatter_slot[cu]] += x;
                } else {
                    scatter_mark[cu] = c;
                    scatter_slot[cu] = indices.len();
                    indices.push(cu);
                    data.push(x);
                }
            }
            v = matching.matching[v];
            if v == representative {
                break;
            }
        }
        // Canonical CSR wants each row sorted.
        let mut row: Vec<(usize, f64)> = indices[row_start..]
            .iter()
            .copied()
            .zip(data[row_start..].iter().copied())
            .collect();
        row.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        for (k, (u, x)) in row.into_iter().enumerate() {
            indices[row_start + k] = u;
            data[row_start + k] = x;
        }
        indptr.push(indices.len());
    }

    let adjacency = CsMat::new((cn, cn), indptr, indices, data);
    Graph::from_parts_unchecked(adjacency, coarse_weights)
}
