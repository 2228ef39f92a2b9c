// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! One-directional matching of a pattern against a subject.
//!
//! Only pattern variables are bound; variables of the subject are rigid and
//! can only be matched by a pattern variable or by themselves. Matching a
//! collection pattern with a frame chooses which subject entries the explicit
//! pattern entries correspond to, and binds the frame to everything else.
//! The choices are enumerated lazily and in a fixed order by [`Matches`].

use std::collections::VecDeque;
use std::ops::Range;

use itertools::{Itertools, Permutations};
use kterm::hashmap::HashSet;
use kterm::subst::Substitution;
use kterm::syntax::*;

use crate::collections::{cancel_ground, entry_goals, pairing_key, rebuild, remaining};

/// Lazily enumerate every substitution θ such that `θ(pattern) == subject`.
pub fn matches(pattern: &Term, subject: &Term) -> Matches {
    matches_with(pattern, subject, Substitution::new())
}

/// Like [`matches`], but every result extends `seed`. Variables bound by
/// `seed` (for instance to themselves) are not rebound.
pub fn matches_with(pattern: &Term, subject: &Term, seed: Substitution) -> Matches {
    Matches {
        stack: vec![Task::Run(State {
            subst: seed,
            goals: VecDeque::from([(pattern.clone(), subject.clone())]),
            deferred: VecDeque::new(),
        })],
    }
}

/// The first match, if there is one.
pub fn match_term(pattern: &Term, subject: &Term) -> Option<Substitution> {
    matches(pattern, subject).next()
}

/// The lazy sequence of matches. Cloning the sequence restarts enumeration
/// from the clone's current position.
#[derive(Clone, Debug)]
pub struct Matches {
    stack: Vec<Task>,
}

#[derive(Clone, Debug)]
enum Task {
    Run(State),
    Choose(Choice),
}

#[derive(Clone, Debug)]
struct State {
    subst: Substitution,
    /// pattern/subject pairs still to be matched
    goals: VecDeque<(Term, Term)>,
    /// collection pairs, handled once the plain goals are exhausted
    deferred: VecDeque<(Collection, Collection)>,
}

enum Outcome {
    Done(Substitution),
    Failed,
    Branch(Choice),
}

/// A choice point: the ways of assigning the unpaired pattern entries of an
/// unordered collection to distinct subject entries. Subject entries that are
/// equal (in a bag) are interchangeable, so only one of the assignments
/// differing by them is tried.
#[derive(Clone, Debug)]
struct Choice {
    base: State,
    kind: CollectionKind,
    pattern: Vec<Entry>,
    subject: Vec<Entry>,
    frame: Option<Term>,
    subject_frame: Option<Term>,
    assignments: Permutations<Range<usize>>,
    tried: HashSet<Vec<(Entry, Entry)>>,
}

impl Iterator for Matches {
    type Item = Substitution;

    fn next(&mut self) -> Option<Substitution> {
        while let Some(task) = self.stack.pop() {
            match task {
                Task::Run(state) => match state.run() {
                    Outcome::Done(subst) => return Some(subst),
                    Outcome::Failed => (),
                    Outcome::Branch(choice) => self.stack.push(Task::Choose(choice)),
                },
                Task::Choose(mut choice) => {
                    if let Some(state) = choice.next_state() {
                        self.stack.push(Task::Choose(choice));
                        if let Some(state) = state {
                            self.stack.push(Task::Run(state));
                        }
                    }
                }
            }
        }
        None
    }
}

impl State {
    fn run(mut self) -> Outcome {
        loop {
            while let Some((pattern, subject)) = self.goals.pop_front() {
                if !self.step(pattern, subject) {
                    return Outcome::Failed;
                }
            }
            match self.deferred.pop_front() {
                None => return Outcome::Done(self.subst),
                Some((pattern, subject)) => match self.expand(pattern, subject) {
                    Expansion::Failed => return Outcome::Failed,
                    Expansion::Continue => (),
                    Expansion::Branch(choice) => return Outcome::Branch(choice),
                },
            }
        }
    }

    /// Decompose one goal, binding variables and queueing subgoals. Returns
    /// false if the goal cannot match.
    fn step(&mut self, pattern: Term, subject: Term) -> bool {
        match (pattern, subject) {
            (Term::Variable(v), subject) => match self.subst.get(&v) {
                Some(bound) => *bound == subject,
                None if v.sort.accepts(&subject.sort()) => {
                    self.subst.insert(v, subject);
                    true
                }
                None => false,
            },
            (pattern, subject) if pattern.is_ground() => pattern == subject,
            (
                Term::App { label, args, .. },
                Term::App {
                    label: subject_label,
                    args: subject_args,
                    ..
                },
            ) => {
                if label != subject_label || args.len() != subject_args.len() {
                    return false;
                }
                self.goals.extend(args.into_iter().zip(subject_args));
                true
            }
            (Term::Collection(p), Term::Collection(s)) if p.kind == s.kind => {
                self.deferred.push_back((p, s));
                true
            }
            _ => false,
        }
    }

    fn expand(&mut self, p: Collection, s: Collection) -> Expansion {
        let frame = p.frame.map(|f| *f);
        let subject_frame = s.frame.map(|f| *f);

        if p.kind.is_ordered() {
            // the explicit pattern entries match a prefix of the subject
            if p.entries.len() > s.entries.len() {
                return Expansion::Failed;
            }
            let (prefix, suffix) = s.entries.split_at(p.entries.len());
            for (pe, se) in p.entries.iter().zip(prefix) {
                match entry_goals(pe, se) {
                    Some(goals) => self.goals.extend(goals),
                    None => return Expansion::Failed,
                }
            }
            return self.bind_rest(p.kind, frame, suffix.to_vec(), subject_frame);
        }

        let Some(cancelled) = cancel_ground(&p.entries, &s.entries, true) else {
            return Expansion::Failed;
        };
        self.goals.extend(cancelled.goals);
        let (k, n) = (cancelled.left.len(), cancelled.right.len());
        if k > n || (frame.is_none() && k < n) {
            return Expansion::Failed;
        }
        if k == 0 {
            return self.bind_rest(p.kind, frame, cancelled.right, subject_frame);
        }
        Expansion::Branch(Choice {
            base: self.clone(),
            kind: p.kind,
            pattern: cancelled.left,
            subject: cancelled.right,
            frame,
            subject_frame,
            assignments: (0..n).permutations(k),
            tried: HashSet::default(),
        })
    }

    /// Match whatever the explicit pattern entries did not consume against the
    /// pattern frame.
    fn bind_rest(
        &mut self,
        kind: CollectionKind,
        frame: Option<Term>,
        rest: Vec<Entry>,
        subject_frame: Option<Term>,
    ) -> Expansion {
        match frame {
            Some(frame) => {
                self.goals
                    .push_back((frame, rebuild(kind, rest, subject_frame)));
                Expansion::Continue
            }
            None if rest.is_empty() && subject_frame.is_none() => Expansion::Continue,
            None => Expansion::Failed,
        }
    }
}

enum Expansion {
    Failed,
    Continue,
    Branch(Choice),
}

impl Choice {
    /// The state for the next assignment. The outer `None` means the choices
    /// are exhausted; the inner `None` means this assignment pairs entries of
    /// different shapes.
    fn next_state(&mut self) -> Option<Option<State>> {
        let assignment = self.assignments.next()?;
        let chosen = assignment.iter().map(|&j| &self.subject[j]);
        let key = pairing_key(self.pattern.iter().zip(chosen));
        if !self.tried.insert(key) {
            return Some(None);
        }
        let mut state = self.base.clone();
        for (pe, &j) in self.pattern.iter().zip(&assignment) {
            match entry_goals(pe, &self.subject[j]) {
                Some(goals) => state.goals.extend(goals),
                None => return Some(None),
            }
        }
        let rest = remaining(&self.subject, &assignment);
        match state.bind_rest(self.kind, self.frame.clone(), rest, self.subject_frame.clone()) {
            Expansion::Continue => Some(Some(state)),
            _ => Some(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(entries: Vec<Term>, frame: Option<Term>) -> Term {
        Term::collection(
            CollectionKind::Set,
            entries.into_iter().map(Entry::Element).collect(),
            frame,
        )
    }

    fn cfg(args: Vec<Term>) -> Term {
        Term::app("cfg", Sort::named("Cfg"), args)
    }

    #[test]
    fn test_match_app() {
        let x = Variable::new("X", Sort::Int);
        let pattern = cfg(vec![Term::Variable(x.clone()), Term::Variable(x.clone())]);
        let subject = cfg(vec![Term::int(1), Term::int(1)]);
        let theta = match_term(&pattern, &subject).unwrap();
        assert_eq!(theta.get(&x), Some(&Term::int(1)));
        assert_eq!(theta.apply(&pattern), subject);

        // nonlinear pattern
        assert!(match_term(&pattern, &cfg(vec![Term::int(1), Term::int(2)])).is_none());
        // sorts are respected
        assert!(match_term(&pattern, &cfg(vec![Term::string("a"), Term::string("a")])).is_none());
    }

    #[test]
    fn test_subject_variables_are_rigid() {
        let y = Term::var("Y", Sort::Int);
        assert!(match_term(&Term::int(1), &y).is_none());
        let theta = match_term(&Term::var("X", Sort::Int), &y).unwrap();
        assert_eq!(theta.apply(&Term::var("X", Sort::Int)), y);
    }

    #[test]
    fn test_frame_enumeration() {
        let n = 4;
        let subject = set((0..n).map(Term::int).collect(), None);
        let pattern = set(
            vec![Term::var("X", Sort::Int)],
            Some(Term::var("F", Sort::Set)),
        );
        let all: Vec<Substitution> = matches(&pattern, &subject).collect();
        assert_eq!(all.len(), n as usize);
        for theta in &all {
            assert_eq!(theta.apply(&pattern), subject);
        }
        // restartable: a clone starts over from the same position
        let seq = matches(&pattern, &subject);
        assert_eq!(seq.clone().collect::<Vec<_>>(), seq.collect::<Vec<_>>());
    }

    #[test]
    fn test_two_entries_and_frame() {
        let subject = set((0..3).map(Term::int).collect(), None);
        let pattern = set(
            vec![Term::var("X", Sort::Int), Term::var("Y", Sort::Int)],
            Some(Term::var("F", Sort::Set)),
        );
        // ordered pairs of distinct elements
        assert_eq!(matches(&pattern, &subject).count(), 6);
    }

    #[test]
    fn test_equal_bag_entries_are_interchangeable() {
        let bag = |entries: Vec<Term>, frame: Option<Term>| {
            Term::collection(
                CollectionKind::Bag,
                entries.into_iter().map(Entry::Element).collect(),
                frame,
            )
        };
        let subject = bag(vec![Term::int(1), Term::int(1), Term::int(2)], None);
        let pattern = bag(
            vec![Term::var("X", Sort::Int)],
            Some(Term::var("F", Sort::Bag)),
        );
        let all: Vec<Substitution> = matches(&pattern, &subject).collect();
        assert_eq!(all.len(), 2);
        assert_ne!(all[0], all[1]);
        for theta in &all {
            assert_eq!(theta.apply(&pattern), subject);
        }

        // two pattern entries: {1, 1}, {1, 2} and {2, 1}
        let pattern = bag(
            vec![Term::var("X", Sort::Int), Term::var("Y", Sort::Int)],
            Some(Term::var("F", Sort::Bag)),
        );
        assert_eq!(matches(&pattern, &subject).count(), 3);
    }

    #[test]
    fn test_ground_entries_without_frame() {
        let subject = set(vec![Term::int(1), Term::int(2)], None);
        let pattern = set(vec![Term::int(1), Term::var("X", Sort::Int)], None);
        let all: Vec<Substitution> = matches(&pattern, &subject).collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get(&Variable::new("X", Sort::Int)), Some(&Term::int(2)));

        let too_small = set(vec![Term::var("X", Sort::Int)], None);
        assert!(match_term(&too_small, &subject).is_none());
    }

    #[test]
    fn test_map_lookup_pattern() {
        let subject = Term::collection(
            CollectionKind::Map,
            vec![
                Entry::Binding(Term::string("x"), Term::int(1)),
                Entry::Binding(Term::string("y"), Term::int(2)),
            ],
            None,
        );
        let pattern = Term::collection(
            CollectionKind::Map,
            vec![Entry::Binding(Term::string("y"), Term::var("V", Sort::Int))],
            Some(Term::var("M", Sort::Map)),
        );
        let theta = match_term(&pattern, &subject).unwrap();
        assert_eq!(theta.get(&Variable::new("V", Sort::Int)), Some(&Term::int(2)));
        assert_eq!(theta.apply(&pattern), subject);
    }

    #[test]
    fn test_list_prefix() {
        let list = |entries: Vec<Term>, frame| {
            Term::collection(
                CollectionKind::List,
                entries.into_iter().map(Entry::Element).collect(),
                frame,
            )
        };
        let subject = list(vec![Term::int(1), Term::int(2), Term::int(3)], None);
        let pattern = list(vec![Term::var("H", Sort::Int)], Some(Term::var("T", Sort::List)));
        let all: Vec<Substitution> = matches(&pattern, &subject).collect();
        assert_eq!(all.len(), 1);
        assert_eq!(
            all[0].get(&Variable::new("T", Sort::List)),
            Some(&list(vec![Term::int(2), Term::int(3)], None))
        );
    }

    #[test]
    fn test_seeded_variables_are_rigid() {
        let x = Variable::new("X", Sort::Int);
        let seed: Substitution = [(x.clone(), Term::Variable(x.clone()))].into_iter().collect();
        assert!(matches_with(&Term::Variable(x.clone()), &Term::int(3), seed.clone())
            .next()
            .is_none());
        assert!(matches_with(&Term::Variable(x.clone()), &Term::Variable(x), seed)
            .next()
            .is_some());
    }
}
