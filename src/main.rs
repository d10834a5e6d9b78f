use lamina::env_var::config;
use lamina::{
    multiply_row_block, read_matrix, write_matrix, LaminaResult, Matrix, RowBlock, RowPartition,
    World, WorldBuilder, ROOT_PE,
};

use std::path::Path;
use std::process::{Child, Command};
use std::time::{Duration, Instant};
use tracing::debug;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let code = match config().pe_id {
        None => launch(),
        Some(my_pe) => run_pe(my_pe),
    };
    std::process::exit(code);
}

/// Spawn the PEs of one job and supervise them.
///
/// A process without `LAMINA_PE_ID` in its environment is the launcher: it
/// re-executes itself `num_pes` times with the ranks and a fresh job id set,
/// forwarding its arguments. The first PE to exit nonzero takes the rest of
/// the group down with it and becomes the job's exit code.
fn launch() -> i32 {
    let num_pes = config().num_pes;
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            eprintln!("Error: cannot determine executable path: {}", e);
            return 1;
        }
    };
    let args: Vec<String> = std::env::args().skip(1).collect();
    let job_id = std::process::id() as usize;
    debug!("launching job {} with {} pes", job_id, num_pes);

    let mut children: Vec<Option<Child>> = Vec::with_capacity(num_pes);
    for pe in 0..num_pes {
        match Command::new(&exe)
            .args(&args)
            .env("LAMINA_NUM_PES", num_pes.to_string())
            .env("LAMINA_PE_ID", pe.to_string())
            .env("LAMINA_JOB_ID", job_id.to_string())
            .spawn()
        {
            Ok(child) => children.push(Some(child)),
            Err(e) => {
                eprintln!("Error: cannot spawn pe {}: {}", pe, e);
                kill_remaining(&mut children);
                return 1;
            }
        }
    }
    supervise(&mut children)
}

fn supervise(children: &mut [Option<Child>]) -> i32 {
    let mut running = children.iter().filter(|c| c.is_some()).count();
    while running > 0 {
        for i in 0..children.len() {
            let polled = match children[i].as_mut() {
                Some(child) => child.try_wait(),
                None => continue,
            };
            match polled {
                Ok(Some(status)) => {
                    let code = status.code().unwrap_or(1);
                    children[i] = None;
                    running -= 1;
                    if code != 0 {
                        debug!("pe exited with {}, terminating the group", code);
                        kill_remaining(children);
                        return code;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    eprintln!("Error: lost track of a pe: {}", e);
                    kill_remaining(children);
                    return 1;
                }
            }
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    0
}

fn kill_remaining(children: &mut [Option<Child>]) {
    for slot in children.iter_mut() {
        if let Some(child) = slot {
            let _ = child.kill();
            let _ = child.wait();
            *slot = None;
        }
    }
}

/// The single SPMD entry routine, parameterized by this PE's rank; every PE
/// executes it over its own partition of the data, with coordinator-only
/// behavior (file I/O, timing, result assembly) behind the role check.
fn run_pe(my_pe: usize) -> i32 {
    let num_pes = config().num_pes;
    let args: Vec<String> = std::env::args().collect();

    // argument and divisibility failures happen before any communication:
    // every PE sees the same inputs and fails the same way, the coordinator
    // alone reports.
    let dim = match args.get(1).and_then(|arg| arg.parse::<usize>().ok()) {
        Some(dim) if dim > 0 => dim,
        _ => {
            if my_pe == ROOT_PE {
                eprintln!("Usage: {} <matrix_size>", args[0]);
            }
            return 1;
        }
    };
    let part = match RowPartition::new(dim, num_pes) {
        Ok(part) => part,
        Err(e) => {
            if my_pe == ROOT_PE {
                eprintln!("{}", e);
            }
            return 1;
        }
    };

    let world = WorldBuilder::new()
        .with_staging_capacity(dim * dim * std::mem::size_of::<f32>())
        .build();
    debug!("pe {} of {} joined job", world.my_pe(), world.num_pes());

    // every PE owns a block of A and C plus a full replica of B; only the
    // coordinator materializes the full A and C
    let mut local_a = ok_or_abort(&world, RowBlock::zeros(part.rows_per_pe(), dim));
    let mut local_c = ok_or_abort(&world, RowBlock::zeros(part.rows_per_pe(), dim));
    let mut b = ok_or_abort(&world, Matrix::zeros(dim));

    let (a, mut c) = if world.is_coordinator() {
        let a = ok_or_abort(&world, read_matrix(Path::new(&config().matrix_a), dim));
        b = ok_or_abort(&world, read_matrix(Path::new(&config().matrix_b), dim));
        let c = ok_or_abort(&world, Matrix::zeros(dim));
        (Some(a), Some(c))
    } else {
        (None, None)
    };

    let start = world.is_coordinator().then(Instant::now);

    ok_or_abort(&world, world.broadcast(ROOT_PE, b.as_mut_slice()));
    ok_or_abort(
        &world,
        world.scatter(
            ROOT_PE,
            a.as_ref().map(|a| a.as_slice()),
            local_a.as_mut_slice(),
        ),
    );

    multiply_row_block(&local_a, &b, &mut local_c);

    ok_or_abort(
        &world,
        world.gather(
            ROOT_PE,
            local_c.as_slice(),
            c.as_mut().map(|c| c.as_mut_slice()),
        ),
    );
    let elapsed = start.map(|s| s.elapsed());

    if let Some(c) = c {
        ok_or_abort(&world, write_matrix(Path::new(&config().matrix_c), &c));
        if let Some(elapsed) = elapsed {
            println!("Execution Time: {} seconds", elapsed.as_secs_f64());
        }
    }
    0
}

/// Unwrap a job-fatal result: report the diagnostic from the PE that
/// detected it and take the whole group down.
fn ok_or_abort<T>(world: &World, res: LaminaResult<T>) -> T {
    match res {
        Ok(val) => val,
        Err(e) => {
            eprintln!("{}", e);
            world.abort(1);
        }
    }
}
