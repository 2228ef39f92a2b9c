// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Traits defining a very basic interface to decision procedures and a few
//! combinators over them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use kterm::sorts::Signature;
use thiserror::Error;

use crate::constraint::Constraint;

/// SatResp is a decision procedure's answer to a satisfiability query.
///
/// For unknown it also returns the reason the procedure provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResp {
    /// Some assignment satisfies the constraint.
    Sat,
    /// No assignment satisfies the constraint.
    Unsat,
    /// The procedure could not decide the constraint.
    Unknown(String),
}

/// An error raised by a decision procedure, fatal for the enclosing query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// The query did not finish in time
    #[error("solver query timed out after {0:?}")]
    Timeout(Duration),
    /// The decision procedure could not be reached
    #[error("solver unavailable: {0}")]
    Unavailable(String),
    /// The answer was unknown and the configuration treats that as fatal
    #[error("solver returned unknown: {0}")]
    Unknown(String),
}

/// A basic decision procedure interface
pub trait BasicSolver: Sync + Send {
    /// Check the satisfiability of `constraint`, whose terms are written in
    /// `sig`.
    fn check_sat(&self, sig: &Signature, constraint: &Constraint) -> Result<SatResp, SolverError>;
}

impl<S: BasicSolver + ?Sized> BasicSolver for Arc<S> {
    fn check_sat(&self, sig: &Signature, constraint: &Constraint) -> Result<SatResp, SolverError> {
        (**self).check_sat(sig, constraint)
    }
}

impl<S: BasicSolver + ?Sized> BasicSolver for Box<S> {
    fn check_sat(&self, sig: &Signature, constraint: &Constraint) -> Result<SatResp, SolverError> {
        (**self).check_sat(sig, constraint)
    }
}

/// A set of solvers used in a fallback fashion: on each query the solvers
/// are tried sequentially until (1) one of them returns a sat/unsat/error
/// response, or (2) all solvers return unknown.
pub struct FallbackSolvers(Vec<Box<dyn BasicSolver>>);

impl FallbackSolvers {
    /// Create a new set of fallback solvers.
    pub fn new(solvers: Vec<Box<dyn BasicSolver>>) -> Self {
        Self(solvers)
    }
}

impl BasicSolver for FallbackSolvers {
    fn check_sat(&self, sig: &Signature, constraint: &Constraint) -> Result<SatResp, SolverError> {
        let mut unknowns: Vec<String> = vec![];
        for solver in &self.0 {
            match solver.check_sat(sig, constraint)? {
                SatResp::Unknown(reason) => unknowns.push(reason),
                resp => return Ok(resp),
            }
        }
        Ok(SatResp::Unknown(unknowns.join("\n")))
    }
}

/// Default number of worker threads a [`DeadlineSolver`] lets run at once.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Runs each query of the wrapped solver on a worker thread and gives up with
/// [`SolverError::Timeout`] once the deadline has passed. The abandoned worker
/// is detached and its eventual answer is dropped. Abandoned workers count
/// toward `max_workers` until they finish; while the limit is reached, queries
/// fail with [`SolverError::Unavailable`].
pub struct DeadlineSolver {
    inner: Arc<dyn BasicSolver>,
    timeout: Duration,
    max_workers: usize,
    workers: Arc<AtomicUsize>,
}

impl DeadlineSolver {
    #[allow(missing_docs)]
    pub fn new(inner: Arc<dyn BasicSolver>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            max_workers: DEFAULT_MAX_WORKERS,
            workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Limit the number of workers running at once (at least one).
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Number of workers still running, abandoned ones included.
    pub fn running_workers(&self) -> usize {
        self.workers.load(Ordering::SeqCst)
    }
}

impl BasicSolver for DeadlineSolver {
    fn check_sat(&self, sig: &Signature, constraint: &Constraint) -> Result<SatResp, SolverError> {
        if self.workers.fetch_add(1, Ordering::SeqCst) >= self.max_workers {
            self.workers.fetch_sub(1, Ordering::SeqCst);
            return Err(SolverError::Unavailable(format!(
                "{} timed out queries are still running",
                self.max_workers
            )));
        }
        let (send, recv) = mpsc::channel();
        let inner = self.inner.clone();
        let workers = self.workers.clone();
        let sig = sig.clone();
        let constraint = constraint.clone();
        thread::Builder::new()
            .name("solver-query".to_string())
            .spawn(move || {
                let resp = inner.check_sat(&sig, &constraint);
                workers.fetch_sub(1, Ordering::SeqCst);
                // the receiver is gone if the deadline already passed
                let _ = send.send(resp);
            })
            .map_err(|e| {
                self.workers.fetch_sub(1, Ordering::SeqCst);
                SolverError::Unavailable(e.to_string())
            })?;
        match recv.recv_timeout(self.timeout) {
            Ok(resp) => resp,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(SolverError::Timeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(SolverError::Unavailable(
                "solver thread exited without answering".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(SatResp);

    impl BasicSolver for Fixed {
        fn check_sat(&self, _: &Signature, _: &Constraint) -> Result<SatResp, SolverError> {
            Ok(self.0.clone())
        }
    }

    struct Slow;

    impl BasicSolver for Slow {
        fn check_sat(&self, _: &Signature, _: &Constraint) -> Result<SatResp, SolverError> {
            thread::sleep(Duration::from_millis(500));
            Ok(SatResp::Sat)
        }
    }

    #[test]
    fn test_fallback() {
        let sig = Signature::with_builtins();
        let solvers = FallbackSolvers::new(vec![
            Box::new(Fixed(SatResp::Unknown("first".to_string()))),
            Box::new(Fixed(SatResp::Unsat)),
            Box::new(Fixed(SatResp::Sat)),
        ]);
        assert_eq!(
            solvers.check_sat(&sig, &Constraint::top()),
            Ok(SatResp::Unsat)
        );

        let unknowns = FallbackSolvers::new(vec![
            Box::new(Fixed(SatResp::Unknown("a".to_string()))),
            Box::new(Fixed(SatResp::Unknown("b".to_string()))),
        ]);
        assert_eq!(
            unknowns.check_sat(&sig, &Constraint::top()),
            Ok(SatResp::Unknown("a\nb".to_string()))
        );
    }

    #[test]
    fn test_deadline() {
        let sig = Signature::with_builtins();
        let timeout = Duration::from_millis(20);
        let slow = DeadlineSolver::new(Arc::new(Slow), timeout);
        assert_eq!(
            slow.check_sat(&sig, &Constraint::top()),
            Err(SolverError::Timeout(timeout))
        );
        let fast = DeadlineSolver::new(Arc::new(Fixed(SatResp::Unsat)), Duration::from_secs(10));
        assert_eq!(fast.check_sat(&sig, &Constraint::top()), Ok(SatResp::Unsat));
        assert_eq!(fast.running_workers(), 0);
    }

    #[test]
    fn test_abandoned_workers_are_bounded() {
        let sig = Signature::with_builtins();
        let timeout = Duration::from_millis(20);
        let slow = DeadlineSolver::new(Arc::new(Slow), timeout).with_max_workers(1);
        assert_eq!(
            slow.check_sat(&sig, &Constraint::top()),
            Err(SolverError::Timeout(timeout))
        );
        // the first worker is still sleeping
        assert_eq!(slow.running_workers(), 1);
        assert!(matches!(
            slow.check_sat(&sig, &Constraint::top()),
            Err(SolverError::Unavailable(_))
        ));
        assert_eq!(slow.running_workers(), 1);

        thread::sleep(Duration::from_millis(800));
        assert_eq!(slow.running_workers(), 0);
        assert_eq!(
            slow.check_sat(&sig, &Constraint::top()),
            Err(SolverError::Timeout(timeout))
        );
    }
}
