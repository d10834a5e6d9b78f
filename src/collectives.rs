//! Collective operations over the shared fabric.
//!
//! Each collective is a blocking, globally synchronizing join point: data is
//! published to the staging region on one side of a barrier and copied out on
//! the other, with a trailing barrier releasing the region for the next
//! operation. All PEs must invoke the same collectives in the same relative
//! order or the job deadlocks (there are no timeouts, matching the underlying
//! model).
//!
//! Staging-capacity overflow is computed from `(N, P)` alone, so it fails
//! identically on every PE before any barrier is entered; the group fails
//! consistently without deadlocking.

use crate::comm::Remote;
use crate::error::LaminaResult;
use crate::world::World;

impl World {
    /// Replicate `root`'s buffer to every PE.
    ///
    /// On return every PE holds a bit-identical copy of `buf` as it was on
    /// `root`; non-root contents on entry are ignored.
    pub fn broadcast<T: Remote>(&self, root: usize, buf: &mut [T]) -> LaminaResult<()> {
        assert!(root < self.num_pes(), "invalid root pe: {:?}", root);
        self.comm().staging_bounds::<T>(buf.len())?;
        if self.my_pe() == root {
            self.comm().staging_write(0, buf)?;
        }
        self.barrier();
        if self.my_pe() != root {
            self.comm().staging_read(0, buf)?;
        }
        self.barrier();
        Ok(())
    }

    /// Split `root`'s send buffer into `num_pes` contiguous chunks in rank
    /// order and deliver one chunk per PE.
    ///
    /// `send` must be `Some` on `root` with exactly `num_pes * recv.len()`
    /// elements; rank `r` receives elements `[r * recv.len(), (r + 1) *
    /// recv.len())`.
    pub fn scatter<T: Remote>(
        &self,
        root: usize,
        send: Option<&[T]>,
        recv: &mut [T],
    ) -> LaminaResult<()> {
        assert!(root < self.num_pes(), "invalid root pe: {:?}", root);
        self.comm().staging_bounds::<T>(recv.len() * self.num_pes())?;
        if self.my_pe() == root {
            let send = send.expect("scatter root must provide a send buffer");
            assert_eq!(send.len(), recv.len() * self.num_pes());
            self.comm().staging_write(0, send)?;
        }
        self.barrier();
        self.comm().staging_read(self.my_pe() * recv.len(), recv)?;
        self.barrier();
        Ok(())
    }

    /// Collect every PE's send chunk into `root`'s receive buffer in rank
    /// order; the exact inverse of [`scatter`](World::scatter).
    pub fn gather<T: Remote>(
        &self,
        root: usize,
        send: &[T],
        recv: Option<&mut [T]>,
    ) -> LaminaResult<()> {
        assert!(root < self.num_pes(), "invalid root pe: {:?}", root);
        self.comm().staging_bounds::<T>(send.len() * self.num_pes())?;
        self.comm().staging_write(self.my_pe() * send.len(), send)?;
        self.barrier();
        if self.my_pe() == root {
            let recv = recv.expect("gather root must provide a receive buffer");
            assert_eq!(recv.len(), send.len() * self.num_pes());
            self.comm().staging_read(0, recv)?;
        }
        self.barrier();
        Ok(())
    }
}
