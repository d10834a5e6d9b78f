use crate::error::{LaminaError, LaminaResult};

use shared_memory::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// Marker for element types that can be moved through the shared segment
/// with a flat memory copy.
pub trait Remote: Copy {}
impl<T: Copy> Remote for T {}

/// Raw view of an attached shared memory segment.
///
/// The first machine word is a handshake header written by the creating PE;
/// `data` points just past it.
struct MyShmem {
    data: *mut u8,
    _shmem: Shmem,
}
unsafe impl Sync for MyShmem {}
unsafe impl Send for MyShmem {}

impl MyShmem {
    fn as_ptr(&self) -> *mut u8 {
        self.data
    }
}

/// Create or attach to the OS shared memory segment backing one job.
///
/// Every PE of the job calls this with the same `size`, `id` and `header`.
/// Whichever process wins the creation race maps the segment, but only the
/// PE with `create == true` zeroes it and publishes the header word; everyone
/// else spins until the header appears. The header store is a release paired
/// with the acquire in the spin, so a peer observing it also observes the
/// zeroed segment.
fn attach_to_shmem(size: usize, id: &str, header: usize, create: bool) -> MyShmem {
    let size = size + std::mem::size_of::<usize>();
    let shmem_id = "lamina_".to_owned() + &(size.to_string()) + "_" + id;
    let init = |m: &Shmem| unsafe {
        std::ptr::write_bytes(m.as_ptr(), 0, size);
        (*(m.as_ptr() as *const AtomicUsize)).store(header, Ordering::Release);
    };
    let m = match ShmemConf::new().size(size).os_id(shmem_id.clone()).create() {
        Ok(m) => {
            trace!("created {:?}", shmem_id);
            if create {
                init(&m);
            }
            m
        }
        Err(ShmemError::LinkExists) | Err(ShmemError::MappingIdExists) => {
            match ShmemConf::new().os_id(shmem_id.clone()).open() {
                Ok(m) => {
                    trace!("attached {:?}", shmem_id);
                    if create {
                        init(&m);
                    }
                    m
                }
                Err(r) => panic!("unable to attach to shared memory {:?} {:?}", shmem_id, r),
            }
        }
        Err(e) => panic!("unable to create shared memory {:?} {:?}", shmem_id, e),
    };
    while unsafe { (*(m.as_ptr() as *const AtomicUsize)).load(Ordering::Acquire) } != header {
        std::thread::yield_now()
    }
    trace!("shmem inited {:?}", shmem_id);

    unsafe {
        MyShmem {
            data: m.as_ptr().add(std::mem::size_of::<usize>()),
            _shmem: m,
        }
    }
}

// Segment layout past the handshake word:
//   [abort flag: AtomicUsize]
//   [barrier slots: num_pes x AtomicUsize]
//   [staging region: staging_capacity bytes]
const ABORT_OFFSET: usize = 0;
const SLOTS_OFFSET: usize = std::mem::size_of::<AtomicUsize>();

/// The shared-memory fabric connecting the PEs of one job.
///
/// Each PE holds its own `ShmemComm` mapping the same OS segment. The fabric
/// carries the group abort flag, the barrier slots, and a staging region that
/// the collectives move matrix data through. All synchronization goes through
/// the atomics; the staging region itself is raced only between barriers.
pub(crate) struct ShmemComm {
    shmem: MyShmem,
    pub(crate) my_pe: usize,
    pub(crate) num_pes: usize,
    staging_capacity: usize,
}

impl ShmemComm {
    pub(crate) fn new(
        num_pes: usize,
        my_pe: usize,
        job_id: usize,
        staging_capacity: usize,
    ) -> ShmemComm {
        assert!(my_pe < num_pes, "invalid pe: {:?} of {:?}", my_pe, num_pes);
        let size = SLOTS_OFFSET + num_pes * std::mem::size_of::<AtomicUsize>() + staging_capacity;
        // odd, therefore nonzero, handshake word so attachers can't race
        // past an uninitialized (zeroed) segment
        let header = (0x1a317a + job_id) | 1;
        let shmem = attach_to_shmem(size, &job_id.to_string(), header, my_pe == 0);
        ShmemComm {
            shmem,
            my_pe,
            num_pes,
            staging_capacity,
        }
    }

    pub(crate) fn staging_capacity(&self) -> usize {
        self.staging_capacity
    }

    fn atomic_at(&self, offset: usize) -> &AtomicUsize {
        unsafe { &*(self.shmem.as_ptr().add(offset) as *const AtomicUsize) }
    }

    /// The per-PE barrier slot published to by `pe`.
    pub(crate) fn barrier_slot(&self, pe: usize) -> &AtomicUsize {
        debug_assert!(pe < self.num_pes);
        self.atomic_at(SLOTS_OFFSET + pe * std::mem::size_of::<AtomicUsize>())
    }

    /// Flag this job as aborted with `code`; peers observe it the next time
    /// they spin on the fabric.
    pub(crate) fn raise_abort(&self, code: i32) {
        self.atomic_at(ABORT_OFFSET)
            .store(code as usize + 1, Ordering::SeqCst);
    }

    /// Returns the abort exit code if any PE has flagged the job as dead.
    pub(crate) fn check_abort(&self) -> Option<i32> {
        match self.atomic_at(ABORT_OFFSET).load(Ordering::SeqCst) {
            0 => None,
            code => Some((code - 1) as i32),
        }
    }

    fn staging_ptr(&self) -> *mut u8 {
        let offset = SLOTS_OFFSET + self.num_pes * std::mem::size_of::<AtomicUsize>();
        unsafe { self.shmem.as_ptr().add(offset) }
    }

    /// Check that a collective moving `total` elements of `T` fits in the
    /// staging region; evaluated before any barrier so every PE fails the
    /// same way.
    pub(crate) fn staging_bounds<T>(&self, total: usize) -> LaminaResult<()> {
        self.staging_bounds_check::<T>(0, total)
    }

    fn staging_bounds_check<T>(&self, offset: usize, len: usize) -> LaminaResult<()> {
        let end = (offset + len) * std::mem::size_of::<T>();
        if end > self.staging_capacity {
            return Err(LaminaError::Resource(format!(
                "transfer of {} bytes exceeds the staging region ({} bytes)",
                end,
                self.staging_capacity()
            )));
        }
        Ok(())
    }

    /// Copy `src` into the staging region at element offset `offset`.
    ///
    /// Safety: callers must separate conflicting staging accesses with
    /// barriers; the rank-order offsets of the collectives keep concurrent
    /// writers disjoint.
    pub(crate) fn staging_write<T: Remote>(&self, offset: usize, src: &[T]) -> LaminaResult<()> {
        self.staging_bounds_check::<T>(offset, src.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(
                src.as_ptr(),
                (self.staging_ptr() as *mut T).add(offset),
                src.len(),
            );
        }
        Ok(())
    }

    /// Copy from the staging region at element offset `offset` into `dst`.
    pub(crate) fn staging_read<T: Remote>(&self, offset: usize, dst: &mut [T]) -> LaminaResult<()> {
        self.staging_bounds_check::<T>(offset, dst.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(
                (self.staging_ptr() as *const T).add(offset),
                dst.as_mut_ptr(),
                dst.len(),
            );
        }
        Ok(())
    }
}
