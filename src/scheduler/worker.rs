//! The fixed-size worker pool driving the setup and record passes.
//!
//! Workers are scoped threads: the orchestrator blocks on the scope join at
//! the end of each pass, which is the only synchronization the passes need.
//! Jobs receive plain indices; the scheduler maps them onto task slots.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;

use anyhow::Result;

#[derive(Debug)]
pub(crate) struct WorkerPool {
    workers: usize,
}

struct Gate {
    started: Vec<bool>,
    running: Vec<bool>,
    done: Vec<bool>,
    started_count: usize,
    running_count: usize,
    abort: bool,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Run `job` for every index in `0..count` across the workers and block
    /// until all of them finished. Failures are returned sorted by index.
    pub fn run_indexed(
        &self,
        count: usize,
        job: impl Fn(usize) -> Result<()> + Sync,
    ) -> Vec<(usize, anyhow::Error)> {
        if count == 0 {
            return Vec::new();
        }
        let next = AtomicUsize::new(0);
        let failures = Mutex::new(Vec::new());
        thread::scope(|scope| {
            for _ in 0..self.workers.min(count) {
                scope.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    if index >= count {
                        break;
                    }
                    if let Err(error) = job(index) {
                        failures.lock().unwrap().push((index, error));
                    }
                });
            }
        });
        let mut failures = failures.into_inner().unwrap();
        failures.sort_by_key(|(index, _)| *index);
        failures
    }

    /// Run `job` for every index in `0..count`, where an index may only start
    /// once `can_start` approves it against the set of completed and currently
    /// running indices, and at most `max_parallel` jobs run at once.
    ///
    /// Indices are started lowest-eligible-first. After the first failure no
    /// new jobs start; in-flight ones run to completion.
    pub fn run_gated(
        &self,
        count: usize,
        max_parallel: usize,
        can_start: impl Fn(usize, &[bool], &[bool]) -> bool + Sync,
        job: impl Fn(usize) -> Result<()> + Sync,
    ) -> Vec<(usize, anyhow::Error)> {
        if count == 0 {
            return Vec::new();
        }
        let max_parallel = max_parallel.max(1);
        let gate = Mutex::new(Gate {
            started: vec![false; count],
            running: vec![false; count],
            done: vec![false; count],
            started_count: 0,
            running_count: 0,
            abort: false,
        });
        let idle = Condvar::new();
        let failures = Mutex::new(Vec::new());

        thread::scope(|scope| {
            for _ in 0..self.workers.min(count) {
                scope.spawn(|| {
                    let mut state = gate.lock().unwrap();
                    loop {
                        if state.abort || state.started_count == count {
                            break;
                        }
                        let eligible = (state.running_count < max_parallel)
                            .then(|| {
                                (0..count).find(|&index| {
                                    !state.started[index]
                                        && can_start(index, &state.done, &state.running)
                                })
                            })
                            .flatten();
                        match eligible {
                            Some(index) => {
                                state.started[index] = true;
                                state.running[index] = true;
                                state.started_count += 1;
                                state.running_count += 1;
                                drop(state);

                                let result = job(index);

                                state = gate.lock().unwrap();
                                state.running[index] = false;
                                state.done[index] = true;
                                state.running_count -= 1;
                                if let Err(error) = result {
                                    failures.lock().unwrap().push((index, error));
                                    state.abort = true;
                                }
                                idle.notify_all();
                            }
                            None => {
                                state = idle.wait(state).unwrap();
                            }
                        }
                    }
                    drop(state);
                    // Wake any worker still parked so it observes the exit condition.
                    idle.notify_all();
                });
            }
        });

        let mut failures = failures.into_inner().unwrap();
        failures.sort_by_key(|(index, _)| *index);
        failures
    }
}
