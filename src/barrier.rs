use crate::comm::ShmemComm;
use crate::env_var::config;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Group-wide synchronization point over the fabric's per-PE slots.
///
/// Each entry bumps a monotonically increasing barrier id, publishes it to
/// this PE's slot, and spins until every slot has caught up. The spin also
/// watches the group abort flag, turning a peer's failure into local
/// termination; this is the synchronization point at which "local detection"
/// becomes "global consequence".
pub(crate) struct Barrier {
    comm: Arc<ShmemComm>,
    barrier_cnt: AtomicUsize,
}

impl Barrier {
    pub(crate) fn new(comm: Arc<ShmemComm>) -> Barrier {
        Barrier {
            comm,
            barrier_cnt: AtomicUsize::new(0),
        }
    }

    fn check_barrier_vals(&self, barrier_id: usize) {
        let mut s = Instant::now();
        for pe in 0..self.comm.num_pes {
            while self.comm.barrier_slot(pe).load(Ordering::SeqCst) < barrier_id {
                if let Some(code) = self.comm.check_abort() {
                    std::process::exit(code);
                }
                std::thread::yield_now();
                if s.elapsed().as_secs_f64() > config().deadlock_timeout {
                    println!(
                        "[{:?}] [LAMINA WARNING] Potential deadlock detected.\n\
                        Barrier is a collective operation requiring all PEs in the job to enter the barrier call.\n\
                        Note that barriers are called internally by the broadcast, scatter, and gather collectives.\n\
                        The deadlock timeout can be set via the LAMINA_DEADLOCK_TIMEOUT environment variable, the current timeout is {} seconds",
                        self.comm.my_pe,
                        config().deadlock_timeout
                    );
                    s = Instant::now();
                }
            }
        }
    }

    pub(crate) fn barrier(&self) {
        if let Some(code) = self.comm.check_abort() {
            std::process::exit(code);
        }
        if self.comm.num_pes > 1 {
            let barrier_id = self.barrier_cnt.fetch_add(1, Ordering::SeqCst) + 1;
            self.comm
                .barrier_slot(self.comm.my_pe)
                .store(barrier_id, Ordering::SeqCst);
            self.check_barrier_vals(barrier_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barrier_joins_all_pes() {
        let num_pes = 3;
        let mut handles = vec![];
        for pe in 0..num_pes {
            handles.push(std::thread::spawn(move || {
                let comm = Arc::new(ShmemComm::new(num_pes, pe, 91001, 16));
                let barrier = Barrier::new(comm);
                for _ in 0..10 {
                    barrier.barrier();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}
