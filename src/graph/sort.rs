//! Newest-first commit ordering.
//!
//! Commits are ordered by timestamp, newest first. Commits sharing a
//! timestamp are common (timestamps have one-second resolution and scripted
//! setups commit in bursts), so each equal-timestamp group is ordered
//! topologically: a descendant always precedes its ancestor, and commits
//! with no relation come out in ascending id order.
//!
//! Ancestry is found with a breadth-first search capped at
//! [`ANCESTRY_STEP_LIMIT`] expansions. Past the cap two commits are treated
//! as unrelated. This is an approximation for very deep or wide histories.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

pub const ANCESTRY_STEP_LIMIT: usize = 500;

/// Whether `ancestor` is reachable from `from` through parent links within
/// `limit` expansions. `parents` returns the parents of a commit (empty for
/// unknown ids).
pub fn find_ancestry<F>(parents: &F, from: &str, ancestor: &str, limit: usize) -> bool
where
    F: Fn(&str) -> Vec<String>,
{
    if from == ancestor {
        return false;
    }
    let mut queue: VecDeque<String> = VecDeque::from([from.to_string()]);
    let mut seen: HashSet<String> = HashSet::from([from.to_string()]);
    let mut steps = 0;

    while let Some(id) = queue.pop_front() {
        if steps >= limit {
            return false;
        }
        steps += 1;
        for parent in parents(&id) {
            if parent == ancestor {
                return true;
            }
            if seen.insert(parent.clone()) {
                queue.push_back(parent);
            }
        }
    }
    false
}

/// Every commit [`find_ancestry`] would reach from `from` within `limit`
/// expansions: the parents of the first `limit` commits visited
/// breadth-first.
pub fn ancestors_within<F>(parents: &F, from: &str, limit: usize) -> HashSet<String>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut queue: VecDeque<String> = VecDeque::from([from.to_string()]);
    let mut seen: HashSet<String> = HashSet::from([from.to_string()]);
    let mut found = HashSet::new();

    for _ in 0..limit {
        let Some(id) = queue.pop_front() else { break };
        for parent in parents(&id) {
            found.insert(parent.clone());
            if seen.insert(parent.clone()) {
                queue.push_back(parent);
            }
        }
    }
    found
}

/// Orders `(id, timestamp)` pairs newest first, using [`ANCESTRY_STEP_LIMIT`].
pub fn order_commits<F>(commits: Vec<(String, i64)>, parents: &F) -> Vec<String>
where
    F: Fn(&str) -> Vec<String>,
{
    order_commits_with_limit(commits, parents, ANCESTRY_STEP_LIMIT)
}

pub fn order_commits_with_limit<F>(commits: Vec<(String, i64)>, parents: &F, limit: usize) -> Vec<String>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut groups: BTreeMap<Reverse<i64>, BTreeSet<String>> = BTreeMap::new();
    for (id, timestamp) in commits {
        groups.entry(Reverse(timestamp)).or_default().insert(id);
    }

    let mut ordered = Vec::new();
    for (_, group) in groups {
        if group.len() == 1 {
            ordered.extend(group);
        } else {
            ordered.extend(order_group(group, parents, limit));
        }
    }
    ordered
}

/// Kahn's algorithm over "is ancestor of" edges, taking the smallest ready
/// id first.
fn order_group<F>(group: BTreeSet<String>, parents: &F, limit: usize) -> Vec<String>
where
    F: Fn(&str) -> Vec<String>,
{
    let ids: Vec<String> = group.into_iter().collect();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    let mut pending: Vec<usize> = vec![0; ids.len()];

    for (i, descendant) in ids.iter().enumerate() {
        let ancestors = ancestors_within(parents, descendant, limit);
        for (j, ancestor) in ids.iter().enumerate() {
            if i != j && ancestors.contains(ancestor) {
                successors[i].push(j);
                pending[j] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..ids.len()).filter(|&i| pending[i] == 0).collect();
    let mut done = vec![false; ids.len()];
    let mut out = Vec::with_capacity(ids.len());

    while out.len() < ids.len() {
        // `ids` is sorted, so the smallest index is the smallest id. An empty
        // ready set can only come from a cycle, which a commit graph cannot
        // have; fall back to id order rather than loop.
        let next = match ready.iter().next().copied() {
            Some(i) => i,
            None => match (0..ids.len()).find(|&i| !done[i]) {
                Some(i) => i,
                None => break,
            },
        };
        ready.remove(&next);
        done[next] = true;
        out.push(ids[next].clone());
        for &succ in &successors[next] {
            pending[succ] = pending[succ].saturating_sub(1);
            if pending[succ] == 0 && !done[succ] {
                ready.insert(succ);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn graph(edges: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        edges
            .iter()
            .map(|(id, parents)| (id.to_string(), parents.iter().map(|p| p.to_string()).collect()))
            .collect()
    }

    fn lookup(g: &HashMap<String, Vec<String>>) -> impl Fn(&str) -> Vec<String> + '_ {
        move |id| g.get(id).cloned().unwrap_or_default()
    }

    #[test]
    fn step_limit_is_pinned() {
        assert_eq!(ANCESTRY_STEP_LIMIT, 500);
    }

    #[test]
    fn chain_with_equal_timestamps_is_descendant_first_for_any_input_order() {
        // Ids chosen so that plain id order would be wrong.
        let g = graph(&[("c", &["b"]), ("b", &["a"]), ("a", &[])]);
        let parents = lookup(&g);
        for input in [["a", "b", "c"], ["c", "a", "b"], ["b", "c", "a"]] {
            let commits = input.iter().map(|id| (id.to_string(), 100)).collect();
            assert_eq!(order_commits(commits, &parents), vec!["c", "b", "a"]);
        }
    }

    #[test]
    fn unrelated_commits_fall_back_to_id_order() {
        let g = graph(&[("z", &[]), ("m", &[]), ("a", &[])]);
        let parents = lookup(&g);
        let first = order_commits(vec![("z".into(), 5), ("a".into(), 5), ("m".into(), 5)], &parents);
        let second = order_commits(vec![("m".into(), 5), ("z".into(), 5), ("a".into(), 5)], &parents);
        assert_eq!(first, vec!["a", "m", "z"]);
        assert_eq!(first, second);
    }

    #[test]
    fn timestamps_dominate() {
        let g = graph(&[("new", &["old"]), ("old", &[])]);
        let parents = lookup(&g);
        let out = order_commits(vec![("old".into(), 1), ("new".into(), 2), ("x".into(), 3)], &parents);
        assert_eq!(out, vec!["x", "new", "old"]);
    }

    #[test]
    fn ancestry_beyond_the_cap_is_treated_as_unrelated() {
        // "top" -> p0 -> p1 -> ... -> p9 -> "bottom"; both ends share a timestamp.
        let mut edges: Vec<(String, Vec<String>)> = vec![("top".into(), vec!["p0".into()])];
        for i in 0..9 {
            edges.push((format!("p{}", i), vec![format!("p{}", i + 1)]));
        }
        edges.push(("p9".into(), vec!["bottom".into()]));
        let g: HashMap<String, Vec<String>> = edges.into_iter().collect();
        let parents = lookup(&g);

        assert!(find_ancestry(&parents, "top", "bottom", ANCESTRY_STEP_LIMIT));
        assert!(!find_ancestry(&parents, "top", "bottom", 3));

        let commits = vec![("top".to_string(), 7), ("bottom".to_string(), 7)];
        assert_eq!(
            order_commits_with_limit(commits.clone(), &parents, ANCESTRY_STEP_LIMIT),
            vec!["top", "bottom"]
        );
        // With a tiny cap the relation is missed and id order wins.
        assert_eq!(order_commits_with_limit(commits, &parents, 3), vec!["bottom", "top"]);
    }

    #[test]
    fn ancestor_sets_agree_with_pairwise_search_at_every_cap() {
        // A diamond on top of a short chain.
        let g = graph(&[
            ("m", &["l", "r"]),
            ("l", &["base"]),
            ("r", &["base"]),
            ("base", &["root"]),
            ("root", &[]),
        ]);
        let parents = lookup(&g);
        for limit in 0..6 {
            let set = ancestors_within(&parents, "m", limit);
            for target in ["l", "r", "base", "root"] {
                assert_eq!(
                    set.contains(target),
                    find_ancestry(&parents, "m", target, limit),
                    "{} at limit {}",
                    target,
                    limit
                );
            }
        }
        assert!(ancestors_within(&parents, "m", 0).is_empty());
    }

    #[test]
    fn large_equal_timestamp_group_stays_topological() {
        let ids: Vec<String> = (0..300).map(|i| format!("c{:03}", i)).collect();
        // c000 is the root; every later id is the child of the one before.
        let g: HashMap<String, Vec<String>> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), if i == 0 { vec![] } else { vec![ids[i - 1].clone()] }))
            .collect();
        let parents = lookup(&g);
        let commits = ids.iter().map(|id| (id.clone(), 42)).collect();
        let expected: Vec<String> = ids.iter().rev().cloned().collect();
        assert_eq!(order_commits(commits, &parents), expected);
    }

    #[test]
    fn a_commit_is_not_its_own_ancestor() {
        let g = graph(&[("a", &[])]);
        assert!(!find_ancestry(&lookup(&g), "a", "a", 10));
    }
}
