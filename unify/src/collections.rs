// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Helpers shared by collection matching and unification.

use itertools::{Either, Itertools};
use kterm::syntax::{CollectionKind, Entry, Term};

/// The explicit entries of two collections after pairing off entries that
/// have the same ground key.
#[derive(Debug)]
pub struct Cancelled {
    /// Goals produced by the pairing (map values bound to the same key)
    pub goals: Vec<(Term, Term)>,
    /// Unpaired entries of the left collection
    pub left: Vec<Entry>,
    /// Unpaired entries of the right collection
    pub right: Vec<Entry>,
}

/// Pair every ground-keyed entry of `left` with an entry of `right` that has
/// the same key.
///
/// With `require_partner`, a ground left entry that has no partner makes the
/// whole cancellation fail (matching cannot place it anywhere else); without
/// it, the entry stays unpaired for the combinatorial phase.
pub fn cancel_ground(
    left: &[Entry],
    right: &[Entry],
    require_partner: bool,
) -> Option<Cancelled> {
    let mut right: Vec<Entry> = right.to_vec();
    let mut unpaired = vec![];
    let mut goals = vec![];
    for entry in left {
        if !entry.key().is_ground() {
            unpaired.push(entry.clone());
            continue;
        }
        match right.iter().position(|r| r.key() == entry.key()) {
            Some(i) => {
                let partner = right.remove(i);
                goals.extend(entry_goals(entry, &partner)?.into_iter().skip(1));
            }
            None if require_partner => return None,
            None => unpaired.push(entry.clone()),
        }
    }
    Some(Cancelled {
        goals,
        left: unpaired,
        right,
    })
}

/// The goals equating two entries: the elements, or the keys then the values.
/// Entries of different shapes cannot be equated.
pub fn entry_goals(a: &Entry, b: &Entry) -> Option<Vec<(Term, Term)>> {
    match (a, b) {
        (Entry::Element(x), Entry::Element(y)) => Some(vec![(x.clone(), y.clone())]),
        (Entry::Binding(k1, v1), Entry::Binding(k2, v2)) => {
            Some(vec![(k1.clone(), k2.clone()), (v1.clone(), v2.clone())])
        }
        _ => None,
    }
}

/// The entries whose positions are not in `used`, in order.
pub fn remaining(entries: &[Entry], used: &[usize]) -> Vec<Entry> {
    entries
        .iter()
        .enumerate()
        .filter(|(i, _)| !used.contains(i))
        .map(|(_, e)| e.clone())
        .collect()
}

/// The entries an assignment equates, sorted. Assignments that differ only
/// by exchanging equal entries have the same key, and produce the same goals
/// and leftovers.
pub fn pairing_key<'a>(pairs: impl Iterator<Item = (&'a Entry, &'a Entry)>) -> Vec<(Entry, Entry)> {
    pairs
        .map(|(a, b)| (a.clone(), b.clone()))
        .sorted()
        .collect()
}

/// The collection made of `entries` and `frame`, in canonical form.
pub fn rebuild(kind: CollectionKind, entries: Vec<Entry>, frame: Option<Term>) -> Term {
    Term::collection(kind, entries, frame)
}

/// Every partial injection pairing `k` positions out of `0..n` with `k`
/// distinct positions out of `0..m`, for `k` from `max` down to `min`.
///
/// Larger pairings come first, so the most specific unifiers are produced
/// before the ones that push entries into frames.
pub fn injections(
    n: usize,
    m: usize,
    max: usize,
    min: usize,
) -> impl Iterator<Item = (Vec<usize>, Vec<usize>)> {
    (min..=max).rev().flat_map(move |k| {
        if k == 0 {
            return Either::Left(std::iter::once((vec![], vec![])));
        }
        Either::Right(
            (0..n)
                .combinations(k)
                .cartesian_product((0..m).permutations(k).collect_vec()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injections() {
        // two out of three on the left, two ordered out of two on the right
        assert_eq!(injections(3, 2, 2, 2).count(), 3 * 2);
        // k = 1 and k = 0
        assert_eq!(injections(2, 2, 1, 0).count(), 2 * 2 + 1);
        let first = injections(2, 3, 1, 1).next();
        assert_eq!(first, Some((vec![0], vec![0])));
    }

    #[test]
    fn test_pairing_key() {
        let one = Entry::Element(Term::int(1));
        let two = Entry::Element(Term::int(2));
        let x = Entry::Element(Term::var("X", kterm::syntax::Sort::Int));
        let y = Entry::Element(Term::var("Y", kterm::syntax::Sort::Int));
        assert_eq!(
            pairing_key([(&x, &one), (&y, &two)].into_iter()),
            pairing_key([(&y, &two), (&x, &one)].into_iter())
        );
        assert_ne!(
            pairing_key([(&x, &one), (&y, &two)].into_iter()),
            pairing_key([(&x, &two), (&y, &one)].into_iter())
        );
    }

    #[test]
    fn test_cancel_ground() {
        let left = vec![
            Entry::Binding(Term::int(1), Term::var("V", kterm::syntax::Sort::Int)),
            Entry::Binding(Term::var("K", kterm::syntax::Sort::Int), Term::int(0)),
        ];
        let right = vec![
            Entry::Binding(Term::int(1), Term::int(10)),
            Entry::Binding(Term::int(2), Term::int(0)),
        ];
        let c = cancel_ground(&left, &right, true).unwrap();
        assert_eq!(
            c.goals,
            vec![(Term::var("V", kterm::syntax::Sort::Int), Term::int(10))]
        );
        assert_eq!(c.left.len(), 1);
        assert_eq!(c.right, vec![Entry::Binding(Term::int(2), Term::int(0))]);

        let missing = vec![Entry::Element(Term::int(5))];
        assert!(cancel_ground(&missing, &[], true).is_none());
        assert!(cancel_ground(&missing, &[], false).is_some());
    }
}
