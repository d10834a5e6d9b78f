//! Multi-PE tests: every test spawns one thread per PE, each attaching to
//! the job's fabric exactly the way a real process would (the fabric is OS
//! shared memory either way, only the job id differs per test).

use lamina::{multiply_row_block, LaminaError, Matrix, RowBlock, RowPartition, WorldBuilder};

use std::sync::Arc;

/// Run `body` on `num_pes` PEs and return the per-rank results in rank order.
fn spawn_pes<T, F>(num_pes: usize, job_id: usize, staging: usize, body: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(lamina::World) -> T + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let handles: Vec<_> = (0..num_pes)
        .map(|pe| {
            let body = body.clone();
            std::thread::spawn(move || {
                let world = WorldBuilder::new()
                    .with_num_pes(num_pes)
                    .with_pe_id(pe)
                    .with_job_id(job_id)
                    .with_staging_capacity(staging)
                    .build();
                body(world)
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn broadcast_replicates_root_buffer() {
    let num_pes = 3;
    let results = spawn_pes(num_pes, 92001, 64, |world| {
        let mut buf = if world.is_coordinator() {
            vec![1.25f32, -2.0, 3.5, 0.0]
        } else {
            vec![0.0f32; 4]
        };
        world.broadcast(0, &mut buf).unwrap();
        buf
    });
    for buf in results {
        assert_eq!(buf, vec![1.25, -2.0, 3.5, 0.0]);
    }
}

#[test]
fn scatter_delivers_rank_ordered_chunks() {
    let num_pes = 4;
    let chunk = 3;
    let results = spawn_pes(num_pes, 92002, 64, move |world| {
        let send: Option<Vec<f32>> = world
            .is_coordinator()
            .then(|| (0..(num_pes * chunk) as u32).map(|v| v as f32).collect());
        let mut recv = vec![0.0f32; chunk];
        world.scatter(0, send.as_deref(), &mut recv).unwrap();
        recv
    });
    for (pe, recv) in results.iter().enumerate() {
        let expect: Vec<f32> = (0..chunk).map(|i| (pe * chunk + i) as f32).collect();
        assert_eq!(recv, &expect);
    }
}

#[test]
fn gather_is_the_inverse_of_scatter() {
    let num_pes = 4;
    let chunk = 2;
    let full: Vec<f32> = (0..(num_pes * chunk) as u32).map(|v| v as f32).collect();
    let expected = full.clone();
    let results = spawn_pes(num_pes, 92003, 64, move |world| {
        let send = world.is_coordinator().then(|| full.clone());
        let mut recv = vec![0.0f32; chunk];
        world.scatter(0, send.as_deref(), &mut recv).unwrap();
        let mut back = world
            .is_coordinator()
            .then(|| vec![0.0f32; num_pes * chunk]);
        world.gather(0, &recv, back.as_deref_mut()).unwrap();
        back
    });
    assert_eq!(results[0].as_deref(), Some(expected.as_slice()));
}

#[test]
fn oversized_transfer_fails_on_every_pe_without_deadlock() {
    let results = spawn_pes(2, 92004, 8, |world| {
        let mut buf = vec![0.0f32; 16];
        world.broadcast(0, &mut buf)
    });
    for res in results {
        assert!(matches!(res, Err(LaminaError::Resource(_))));
    }
}

/// The full distribution -> compute -> aggregation pipeline, returning the
/// coordinator's result matrix.
fn multiply_job(job_id: usize, dim: usize, num_pes: usize, a: Matrix, b_in: Matrix) -> Matrix {
    let a = Arc::new(a);
    let b_in = Arc::new(b_in);
    let results = spawn_pes(
        num_pes,
        job_id,
        dim * dim * std::mem::size_of::<f32>(),
        move |world| {
            let part = RowPartition::new(dim, world.num_pes()).unwrap();
            let mut local_a = RowBlock::zeros(part.rows_per_pe(), dim).unwrap();
            let mut local_c = RowBlock::zeros(part.rows_per_pe(), dim).unwrap();
            let mut b = if world.is_coordinator() {
                (*b_in).clone()
            } else {
                Matrix::zeros(dim).unwrap()
            };
            let full_a = world.is_coordinator().then(|| (*a).clone());
            let mut c = world
                .is_coordinator()
                .then(|| Matrix::zeros(dim).unwrap());

            world.broadcast(0, b.as_mut_slice()).unwrap();
            world
                .scatter(
                    0,
                    full_a.as_ref().map(|a| a.as_slice()),
                    local_a.as_mut_slice(),
                )
                .unwrap();
            multiply_row_block(&local_a, &b, &mut local_c);
            world
                .gather(
                    0,
                    local_c.as_slice(),
                    c.as_mut().map(|c| c.as_mut_slice()),
                )
                .unwrap();
            c
        },
    );
    results.into_iter().next().unwrap().unwrap()
}

fn reference_product(a: &Matrix, b: &Matrix) -> Matrix {
    let dim = a.dim();
    let mut c = Matrix::zeros(dim).unwrap();
    unsafe {
        matrixmultiply::sgemm(
            dim,
            dim,
            dim,
            1.0,
            a.as_slice().as_ptr(),
            dim as isize,
            1,
            b.as_slice().as_ptr(),
            dim as isize,
            1,
            0.0,
            c.as_mut_slice().as_mut_ptr(),
            dim as isize,
            1,
        );
    }
    c
}

fn random_matrix(dim: usize, seed: u64) -> Matrix {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    Matrix::from_vec(dim, (0..dim * dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
}

fn assert_close(actual: &Matrix, expect: &Matrix) {
    for (x, y) in actual.as_slice().iter().zip(expect.as_slice()) {
        let tol = 1e-5 * y.abs().max(1.0);
        assert!((x - y).abs() <= tol, "{} != {}", x, y);
    }
}

#[test]
fn known_two_by_two_product() {
    let a = Matrix::from_vec(2, vec![1.0, 2.0, 3.0, 4.0]);
    let b = Matrix::from_vec(2, vec![5.0, 6.0, 7.0, 8.0]);
    let c = multiply_job(92005, 2, 1, a, b);
    assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
}

#[test]
fn identity_times_arbitrary_is_identity_mapping() {
    let dim = 4;
    let mut eye = Matrix::zeros(dim).unwrap();
    for i in 0..dim {
        eye.set(i, i, 1.0);
    }
    let b = random_matrix(dim, 7);
    let c = multiply_job(92006, dim, 2, eye, b.clone());
    assert_eq!(c.as_slice(), b.as_slice());
}

#[test]
fn matches_reference_product() {
    let dim = 8;
    let a = random_matrix(dim, 1);
    let b = random_matrix(dim, 2);
    let expect = reference_product(&a, &b);
    let c = multiply_job(92007, dim, 4, a, b);
    assert_close(&c, &expect);
}

#[test]
fn result_is_invariant_to_the_process_count() {
    // each element accumulates over k in the same order under every valid P,
    // so the results are bit-identical, not merely close
    let dim = 8;
    let a = random_matrix(dim, 3);
    let b = random_matrix(dim, 4);
    let mut outputs = vec![];
    for (i, num_pes) in [1, 2, 4, 8].into_iter().enumerate() {
        outputs.push(multiply_job(92010 + i, dim, num_pes, a.clone(), b.clone()));
    }
    for c in &outputs[1..] {
        assert_eq!(c.as_slice(), outputs[0].as_slice());
    }
}
