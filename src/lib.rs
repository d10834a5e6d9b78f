//! Lamina is a small SPMD collectives runtime for dense row-block matrix
//! multiplication across a fixed group of cooperating processes.
//!
//! A job consists of P PEs (processing elements) executing the same program
//! against disjoint local memory. The PEs attach to a shared-memory fabric
//! through which three collective operations move matrix data: a broadcast
//! replicating the right operand B to every PE, a scatter splitting the left
//! operand A into contiguous row blocks in rank order, and a gather
//! collecting the per-PE result blocks back into the full product at the
//! coordinator (PE 0). Every collective is a blocking, globally
//! synchronizing join point.
//!
//! EXAMPLES
//! --------
//!
//! # Constructing a world instance and multiplying
//! ```
//! use lamina::{
//!     multiply_row_block, LaminaResult, Matrix, RowBlock, RowPartition, WorldBuilder, ROOT_PE,
//! };
//!
//! fn main() -> LaminaResult<()> {
//!     let world = WorldBuilder::new()
//!         .with_staging_capacity(4 * 4 * std::mem::size_of::<f32>())
//!         .build();
//!     let part = RowPartition::new(4, world.num_pes())?;
//!
//!     let mut b = Matrix::zeros(4)?;
//!     let mut local_a = RowBlock::zeros(part.rows_per_pe(), 4)?;
//!     let mut local_c = RowBlock::zeros(part.rows_per_pe(), 4)?;
//!     // coordinator loads A and B here ...
//!
//!     world.broadcast(ROOT_PE, b.as_mut_slice())?;
//!     world.scatter(ROOT_PE, None, local_a.as_mut_slice())?;
//!     multiply_row_block(&local_a, &b, &mut local_c);
//!     world.gather(ROOT_PE, local_c.as_slice(), None)?;
//!     Ok(())
//! }
//! ```
//!
//! Jobs are launched by running the `lamina` binary without `LAMINA_PE_ID`
//! set; it spawns `LAMINA_NUM_PES` copies of itself and supervises them,
//! turning any PE's failure into termination of the whole group.

mod barrier;
mod collectives;
mod comm;
pub mod env_var;
mod error;
mod kernel;
mod matrix;
mod partition;
mod store;
mod world;

pub use comm::Remote;
pub use error::{LaminaError, LaminaResult};
pub use kernel::multiply_row_block;
pub use matrix::{Matrix, RowBlock};
pub use partition::RowPartition;
pub use store::{read_matrix, write_matrix};
pub use world::{World, WorldBuilder, ROOT_PE};
