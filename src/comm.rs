//! Process-group abstraction for data-parallel solves.
//!
//! The solvers are written in SPMD style: every process (rank) holds its
//! local rows of the operators and vectors, and the only inter-process
//! interaction is through collective reductions, either of Krylov inner
//! products or of assembled contribution vectors.   All of that traffic
//! goes through the [`Communicator`] trait, so the solver code itself is
//! identical in the serial and distributed cases.
//!
//! Every method of a solver built over a non-trivial communicator is a
//! blocking collective: all ranks in the group must call it together, in
//! the same order, every time.  A rank that skips a call deadlocks the
//! group.  This is a documented caller responsibility and is not checked
//! at runtime.

use crate::algebra::FloatT;
use std::iter::zip;
use std::sync::{Arc, Barrier, Mutex};

/// Collective reduction operations over a process group.
///
/// Reductions are summations, performed in rank order so that every rank
/// observes bitwise identical results.  That determinism is what makes
/// repeated solves with unchanged inputs reproduce exactly.
pub trait Communicator<T>: Send + Sync {
    /// this process's rank in the group
    fn rank(&self) -> usize;

    /// number of processes in the group
    fn size(&self) -> usize;

    /// global sum of one scalar contribution per rank
    fn sum_scalar(&self, x: T) -> T;

    /// elementwise global sum of equal-length contribution slices,
    /// overwriting `x` with the result on every rank
    fn sum_slice(&self, x: &mut [T]);
}

/// Trivial single-process communicator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

/// A shared instance for constructors that default to the serial case.
pub static SERIAL: SerialComm = SerialComm;

impl<T: FloatT> Communicator<T> for SerialComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn sum_scalar(&self, x: T) -> T {
        x
    }
    fn sum_slice(&self, _x: &mut [T]) {}
}

struct ThreadCommShared<T> {
    size: usize,
    slots: Mutex<Vec<Vec<T>>>,
    barrier: Barrier,
}

/// Barrier-based communicator over in-process threads.
///
/// Each member of a [`group`](ThreadComm::group) is handed to one thread,
/// which then plays the role of one rank.  Intended for exercising the
/// collective code paths without an external launcher; the reduction
/// pattern (contribute, synchronize, combine in rank order) matches what
/// an allreduce provides on a real distributed machine.
pub struct ThreadComm<T> {
    rank: usize,
    shared: Arc<ThreadCommShared<T>>,
}

impl<T: FloatT> ThreadComm<T> {
    /// Create a group of `size` connected communicators, one per rank.
    pub fn group(size: usize) -> Vec<ThreadComm<T>> {
        assert!(size > 0);
        let shared = Arc::new(ThreadCommShared {
            size,
            slots: Mutex::new(vec![Vec::new(); size]),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl<T: FloatT> Communicator<T> for ThreadComm<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn sum_scalar(&self, x: T) -> T {
        let mut buf = [x];
        self.sum_slice(&mut buf);
        buf[0]
    }

    fn sum_slice(&self, x: &mut [T]) {
        {
            let mut slots = self.shared.slots.lock().unwrap();
            slots[self.rank] = x.to_vec();
        }
        // wait until every rank has contributed
        self.shared.barrier.wait();
        {
            let slots = self.shared.slots.lock().unwrap();
            x.fill(T::zero());
            for contrib in slots.iter() {
                assert_eq!(contrib.len(), x.len());
                for (xi, ci) in zip(&mut *x, contrib) {
                    *xi += *ci;
                }
            }
        }
        // don't let any rank start the next reduction until all
        // ranks have read this one
        self.shared.barrier.wait();
    }
}
