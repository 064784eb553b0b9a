//! The single-assignment slot every promise is built on.

use std::{cell::RefCell, collections::VecDeque, mem};

use parking_lot::Mutex;

use crate::{Error, PromiseState};

pub(crate) type Outcome<T> = Result<T, Error>;

type Listener<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

type Job = Box<dyn FnOnce() + 'static>;

thread_local! {
    static JOBS: RefCell<VecDeque<Job>> = const { RefCell::new(VecDeque::new()) };
    static DRAINING: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Queues `jobs` on this thread and, unless a drain further up the stack will
/// pick them up, runs the queue until it is empty.
///
/// Settling a cell from inside a listener therefore never nests: the stack
/// stays flat however long the chain of derived promises is.
fn run_jobs<I>(jobs: I)
where
    I: IntoIterator<Item = Job>,
{
    JOBS.with(|queue| queue.borrow_mut().extend(jobs));
    if DRAINING.with(|draining| draining.replace(true)) {
        return;
    }
    let _guard = DrainGuard;
    while let Some(job) = JOBS.with(|queue| queue.borrow_mut().pop_front()) {
        job();
    }
}

struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|draining| draining.set(false));
    }
}

enum Slot<T> {
    Pending(Vec<Listener<T>>),
    Settled(Outcome<T>),
}

/// Holds either the listeners waiting for an outcome or the outcome itself.
///
/// The transition out of `Pending` happens under the lock, at most once.
/// Listeners are always invoked after the lock is released, through the
/// thread's job queue, in the order they were registered.
pub(crate) struct Cell<T> {
    slot: Mutex<Slot<T>>,
}

impl<T: Clone + Send + 'static> Cell<T> {
    pub(crate) fn new() -> Self {
        Cell {
            slot: Mutex::new(Slot::Pending(Vec::new())),
        }
    }

    pub(crate) fn settled(outcome: Outcome<T>) -> Self {
        Cell {
            slot: Mutex::new(Slot::Settled(outcome)),
        }
    }

    /// Moves the cell into its terminal state. Returns `false`, leaving the
    /// cell untouched, if it had already settled.
    pub(crate) fn settle(&self, outcome: Outcome<T>) -> bool {
        let listeners = {
            let mut slot = self.slot.lock();
            let Slot::Pending(listeners) = &mut *slot else {
                log::trace!("ignoring settlement of an already settled promise");
                return false;
            };
            let listeners = mem::take(listeners);
            *slot = Slot::Settled(outcome.clone());
            listeners
        };
        run_jobs(listeners.into_iter().map(|listener| {
            let outcome = outcome.clone();
            Box::new(move || listener(outcome)) as Job
        }));
        true
    }

    pub(crate) fn fulfill(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub(crate) fn reject(&self, error: Error) -> bool {
        self.settle(Err(error))
    }

    /// Registers `listener`, or runs it right away if the outcome is known.
    ///
    /// "Right away" means before this call returns, unless a listener is already
    /// running on this thread; then it runs as soon as that listener is done.
    pub(crate) fn on_settle<F>(&self, listener: F)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let outcome = {
            let mut slot = self.slot.lock();
            match &mut *slot {
                Slot::Pending(listeners) => {
                    listeners.push(Box::new(listener));
                    return;
                }
                Slot::Settled(outcome) => outcome.clone(),
            }
        };
        run_jobs([Box::new(move || listener(outcome)) as Job]);
    }

    pub(crate) fn state(&self) -> PromiseState {
        match &*self.slot.lock() {
            Slot::Pending(_) => PromiseState::Pending,
            Slot::Settled(Ok(_)) => PromiseState::Fulfilled,
            Slot::Settled(Err(_)) => PromiseState::Rejected,
        }
    }

    pub(crate) fn peek(&self) -> Option<Outcome<T>> {
        match &*self.slot.lock() {
            Slot::Pending(_) => None,
            Slot::Settled(outcome) => Some(outcome.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Barrier,
        },
        thread,
    };

    use super::Cell;
    use crate::{Error, PromiseState};

    #[test]
    fn first_settlement_wins() {
        let cell = Cell::new();
        assert_eq!(cell.state(), PromiseState::Pending);
        assert!(cell.fulfill(1));
        assert!(!cell.fulfill(2));
        assert!(!cell.reject(Error::msg("late")));
        assert_eq!(cell.state(), PromiseState::Fulfilled);
        assert_eq!(cell.peek().unwrap().unwrap(), 1);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let cell = Cell::<u32>::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            cell.on_settle(move |outcome| order.lock().push((i, outcome.unwrap())));
        }
        assert!(order.lock().is_empty());
        cell.fulfill(9);
        assert_eq!(*order.lock(), (0..5).map(|i| (i, 9)).collect::<Vec<_>>());
    }

    #[test]
    fn late_listener_runs_immediately() {
        let cell = Cell::<u32>::settled(Err(Error::msg("gone")));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        cell.on_settle(move |outcome| {
            assert!(outcome.is_err());
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(cell.state(), PromiseState::Rejected);
    }

    #[test]
    fn listener_may_register_on_its_own_cell() {
        let cell = Arc::new(Cell::<u32>::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let (inner_cell, counter) = (cell.clone(), seen.clone());
        cell.on_settle(move |_| {
            let counter = counter.clone();
            inner_cell.on_settle(move |outcome| {
                assert_eq!(outcome.unwrap(), 3);
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });
        cell.fulfill(3);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn settling_a_long_chain_keeps_the_stack_flat() {
        let root = Arc::new(Cell::<u64>::new());
        let mut tail = root.clone();
        for _ in 0..200_000 {
            let next = Arc::new(Cell::new());
            let target = next.clone();
            tail.on_settle(move |outcome| {
                target.settle(outcome.map(|v| v + 1));
            });
            tail = next;
        }
        root.fulfill(0);
        assert_eq!(tail.peek().unwrap().unwrap(), 200_000);
    }

    #[test]
    fn nested_listeners_run_after_the_current_one() {
        let first = Arc::new(Cell::<u32>::new());
        let second = Arc::new(Cell::<u32>::new());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (target, log) = (second.clone(), order.clone());
        first.on_settle(move |outcome| {
            target.settle(outcome);
            log.lock().push("first");
        });
        let log = order.clone();
        second.on_settle(move |_| log.lock().push("second"));
        first.fulfill(1);
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[test]
    fn concurrent_settle_and_register_fire_each_listener_once() {
        for _ in 0..50 {
            let cell = Arc::new(Cell::<usize>::new());
            let fired = Arc::new(AtomicUsize::new(0));
            let wins = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(Barrier::new(8));
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let (cell, fired, wins, barrier) =
                        (cell.clone(), fired.clone(), wins.clone(), barrier.clone());
                    thread::spawn(move || {
                        barrier.wait();
                        if i % 2 == 0 {
                            if cell.fulfill(i) {
                                wins.fetch_add(1, Ordering::SeqCst);
                            }
                        } else {
                            cell.on_settle(move |_| {
                                fired.fetch_add(1, Ordering::SeqCst);
                            });
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(wins.load(Ordering::SeqCst), 1);
            assert_eq!(fired.load(Ordering::SeqCst), 4);
            let value = cell.peek().unwrap().unwrap();
            assert_eq!(value % 2, 0);
        }
    }
}
