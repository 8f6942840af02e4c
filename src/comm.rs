//! Collective communication contexts.
//!
//! Every collective operation in this crate (assembly finalization, ghost updates, reductions
//! of functionals) takes a [`Communicator`] explicitly. All ranks of a group must call the same
//! collective operations in the same order.
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, Barrier};

pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn barrier(&self);

    /// Gathers one contribution from every rank. Entry `r` of the result is the contribution of
    /// rank `r`, and every rank receives the same result.
    fn all_gather<T: Clone + Send + 'static>(&self, local: Vec<T>) -> Vec<Vec<T>>;

    /// Sum of `value` over all ranks, accumulated in rank order.
    fn sum(&self, value: f64) -> f64 {
        self.all_gather(vec![value]).into_iter().flatten().sum()
    }
}

impl<'a, C: ?Sized + Communicator> Communicator for &'a C {
    fn rank(&self) -> usize {
        C::rank(self)
    }

    fn size(&self) -> usize {
        C::size(self)
    }

    fn barrier(&self) {
        C::barrier(self)
    }

    fn all_gather<T: Clone + Send + 'static>(&self, local: Vec<T>) -> Vec<Vec<T>> {
        C::all_gather(self, local)
    }
}

/// The single-rank communicator.
#[derive(Debug, Default, Copy, Clone)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn all_gather<T: Clone + Send + 'static>(&self, local: Vec<T>) -> Vec<Vec<T>> {
        vec![local]
    }
}

struct SharedState {
    slots: Mutex<Vec<Option<Box<dyn Any + Send>>>>,
    barrier: Barrier,
}

/// One rank of a group of in-process ranks, each of which is driven by its own thread.
///
/// ```
/// use blockfem::comm::{Communicator, ThreadCommunicator};
///
/// let group = ThreadCommunicator::create_group(3);
/// std::thread::scope(|scope| {
///     for comm in &group {
///         scope.spawn(move || assert_eq!(comm.sum(comm.rank() as f64), 3.0));
///     }
/// });
/// ```
pub struct ThreadCommunicator {
    rank: usize,
    size: usize,
    shared: Arc<SharedState>,
}

impl ThreadCommunicator {
    /// Creates the communicators of a group of `size` ranks, ordered by rank.
    pub fn create_group(size: usize) -> Vec<Self> {
        let size = size.max(1);
        let shared = Arc::new(SharedState {
            slots: Mutex::new((0..size).map(|_| None).collect()),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl std::fmt::Debug for ThreadCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadCommunicator")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn all_gather<T: Clone + Send + 'static>(&self, local: Vec<T>) -> Vec<Vec<T>> {
        self.shared.slots.lock()[self.rank] = Some(Box::new(local));
        self.shared.barrier.wait();

        let gathered = {
            let slots = self.shared.slots.lock();
            slots
                .iter()
                .enumerate()
                .map(|(rank, slot)| {
                    slot.as_ref()
                        .and_then(|contribution| contribution.downcast_ref::<Vec<T>>())
                        .cloned()
                        .unwrap_or_else(|| panic!("rank {rank} did not take part in the same all_gather"))
                })
                .collect()
        };

        // Nobody may overwrite a slot before every rank has read all of them
        self.shared.barrier.wait();
        self.shared.slots.lock()[self.rank] = None;
        gathered
    }
}
