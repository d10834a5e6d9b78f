use crate::barrier::Barrier;
use crate::comm::ShmemComm;
use crate::env_var::config;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The PE that performs file I/O, timing, and result assembly.
pub const ROOT_PE: usize = 0;

/// An abstraction representing all the PEs (processing elements) cooperating
/// in one SPMD job.
///
/// Constructing a `World` is necessary to perform any of the collective
/// operations (broadcast, scatter, gather); the constructor itself is a
/// collective and only returns once the whole group has attached to the
/// fabric.
pub struct World {
    comm: Arc<ShmemComm>,
    barrier: Arc<Barrier>,
    my_pe: usize,
    num_pes: usize,
    ref_cnt: Arc<AtomicUsize>,
}

impl World {
    /// Returns the id of this PE (roughly equivalent to MPI rank)
    pub fn my_pe(&self) -> usize {
        self.my_pe
    }

    /// Returns number of PEs in this execution
    pub fn num_pes(&self) -> usize {
        self.num_pes
    }

    /// Whether this PE is the coordinator (rank 0): the only PE that holds
    /// the full input/output matrices and performs I/O and timing.
    pub fn is_coordinator(&self) -> bool {
        self.my_pe == ROOT_PE
    }

    /// Block until every PE in the job has entered the barrier.
    pub fn barrier(&self) {
        self.barrier.barrier();
    }

    /// Terminate the entire job with `code`.
    ///
    /// The abort flag is raised on the shared fabric before this process
    /// exits, so every peer observes it at its next synchronization spin and
    /// terminates with the same code. There is no recovery path.
    pub fn abort(&self, code: i32) -> ! {
        self.comm.raise_abort(code);
        std::process::exit(code);
    }

    pub(crate) fn comm(&self) -> &ShmemComm {
        &self.comm
    }
}

impl Clone for World {
    fn clone(&self) -> Self {
        self.ref_cnt.fetch_add(1, Ordering::SeqCst);
        World {
            comm: self.comm.clone(),
            barrier: self.barrier.clone(),
            my_pe: self.my_pe,
            num_pes: self.num_pes,
            ref_cnt: self.ref_cnt.clone(),
        }
    }
}

impl Drop for World {
    fn drop(&mut self) {
        let cnt = self.ref_cnt.fetch_sub(1, Ordering::SeqCst);
        if cnt == 1 {
            // keep the fabric mapped until every PE is done with it
            self.barrier.barrier();
        }
    }
}

/// An implementation of the Builder design pattern, used to construct an
/// instance of a [`World`].
///
/// Unset values fall back to the `LAMINA_*` environment configuration, which
/// is how the launcher parameterizes the PEs it spawns; tests set the values
/// explicitly instead.
#[derive(Debug)]
pub struct WorldBuilder {
    num_pes: usize,
    my_pe: usize,
    job_id: usize,
    staging_capacity: usize,
}

impl WorldBuilder {
    /// Construct a new world builder from the environment configuration.
    pub fn new() -> WorldBuilder {
        WorldBuilder {
            num_pes: config().num_pes,
            my_pe: config().pe_id.unwrap_or(0),
            job_id: config().job_id.unwrap_or(0),
            staging_capacity: 0,
        }
    }

    /// Override the number of PEs in the job.
    pub fn with_num_pes(mut self, num_pes: usize) -> WorldBuilder {
        self.num_pes = num_pes;
        self
    }

    /// Override the rank of this PE.
    pub fn with_pe_id(mut self, my_pe: usize) -> WorldBuilder {
        self.my_pe = my_pe;
        self
    }

    /// Override the job id used to name the shared fabric segments.
    pub fn with_job_id(mut self, job_id: usize) -> WorldBuilder {
        self.job_id = job_id;
        self
    }

    /// Size in bytes of the staging region the collectives move data
    /// through; must be identical on every PE and large enough for the
    /// largest single transfer.
    pub fn with_staging_capacity(mut self, bytes: usize) -> WorldBuilder {
        self.staging_capacity = bytes;
        self
    }

    /// Instantiate a [`World`]. Collective: blocks until every PE of the job
    /// has attached to the fabric.
    pub fn build(self) -> World {
        let comm = Arc::new(ShmemComm::new(
            self.num_pes,
            self.my_pe,
            self.job_id,
            self.staging_capacity,
        ));
        let barrier = Arc::new(Barrier::new(comm.clone()));
        let world = World {
            comm,
            barrier,
            my_pe: self.my_pe,
            num_pes: self.num_pes,
            ref_cnt: Arc::new(AtomicUsize::new(1)),
        };
        world.barrier();
        world
    }
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}
