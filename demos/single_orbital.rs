use cthyb::bath::HybridizationTable;
use cthyb::solver::{ImpuritySolver, MoveWeights, SolverConfig};
use env_logger::Builder;
use log::info;
use ndarray::array;
use rand::SeedableRng;
use rand_pcg::Pcg64;

fn main() {
    Builder::new().filter_level(log::LevelFilter::Info).init();

    info!("Starting single-orbital example");

    let beta = 10.0;
    // Single orbital with spin up/down, U = 4 at half filling (mu = U/2)
    let config = SolverConfig {
        beta,
        mu: vec![2.0, 2.0],
        u: array![[0.0, 4.0], [4.0, 0.0]],
        n_bins: 50,
        n_matsubara: 20,
        thermalization_sweeps: 10_000,
        total_sweeps: 100_000,
        measurement_interval: 5,
        recompute_interval: 500,
        drift_tolerance: 1e-8,
        move_weights: MoveWeights::default(),
        max_seconds: Some(600),
        measure_fourpoint: false,
    };

    // Single bath level at zero energy with coupling V = 1, for both spins
    let bath = HybridizationTable::tabulate(2, 1000, beta, |_, _, _| 0.5).unwrap();

    let mut solver = ImpuritySolver::new(config, bath, Pcg64::seed_from_u64(42)).unwrap();
    solver.run();

    println!("CT-HYB segment solver, single orbital");
    println!("-------------------------------------");
    println!("Sweeps done: {}", solver.sweeps_done());
    println!("Measurements: {}", solver.green().count());

    if let Some((sign, sign_err, ..)) = solver.scalars().sign.statistics() {
        println!("Average sign: {:.6} +/- {:.6}", sign, sign_err);
    }
    for flavor in 0..2 {
        if let Some((density, density_err, ..)) = solver.scalars().density[flavor].statistics() {
            println!(
                "Density of flavor {}: {:.6} +/- {:.6}",
                flavor, density, density_err
            );
        }
        if let Some((order, ..)) = solver.scalars().order[flavor].statistics() {
            println!("Average expansion order of flavor {}: {:.3}", flavor, order);
        }
    }

    let green = solver.green_function();
    println!("\nG(tau), flavor 0:");
    for k in (0..=green.n_bins()).step_by(5) {
        println!("  tau = {:6.3}   G = {:+.6}", green.tau(k), green.value(0, k));
    }

    let coeffs = solver.matsubara_function();
    println!("\nG(i omega_n), flavor 0:");
    for m in 0..5 {
        let omega = (2 * m + 1) as f64 * std::f64::consts::PI / beta;
        println!(
            "  omega = {:6.3}   G = {:+.6} {:+.6}i",
            omega,
            coeffs[(0, m)].re,
            coeffs[(0, m)].im
        );
    }
}
