use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use dualis::algorithm::dual_simplex::driver;
use dualis::algorithm::dual_simplex::options::{
    DualEdgeWeightStrategy, PriceStrategy, SolverOptions,
};
use dualis::data::linear_program::elements::SolveStatus;
use dualis::io::import;

/// A revised dual simplex solver for large sparse linear programs.
#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// File containing the problem description (MPS format)
    problem_file: PathBuf,
    /// Disable scaling
    #[arg(long)]
    no_scale: bool,
    /// Disable cost perturbation
    #[arg(long)]
    no_perturb: bool,
    /// Transpose wide problems into their duals
    #[arg(long)]
    transpose: bool,
    /// Randomly permute the columns
    #[arg(long)]
    permute: bool,
    /// Tighten column bounds by constraint propagation
    #[arg(long)]
    tighten: bool,
    /// Use Dantzig pricing instead of dual steepest edge
    #[arg(long)]
    dantzig: bool,
    /// Price column-wise instead of row-wise
    #[arg(long)]
    price_by_col: bool,
    /// Wall-clock limit in seconds
    #[arg(long)]
    time_limit: Option<f64>,
    /// Hard cap on simplex iterations
    #[arg(long)]
    iteration_limit: Option<usize>,
}

fn main() {
    env_logger::init();
    let opts = Opts::parse();

    let problem = match import(&opts.problem_file) {
        Ok(problem) => problem,
        Err(error) => {
            eprintln!("could not read {:?}: {}", opts.problem_file, error);
            exit(1);
        }
    };

    let mut options = SolverOptions::default();
    options.scale_lp = !opts.no_scale;
    options.perturb_costs = !opts.no_perturb;
    options.transpose_lp = opts.transpose;
    options.permute_lp = opts.permute;
    options.tighten_lp = opts.tighten;
    if opts.dantzig {
        options.dual_edge_weight_strategy = DualEdgeWeightStrategy::Dantzig;
    }
    if opts.price_by_col {
        options.price_strategy = PriceStrategy::Col;
    }
    if let Some(limit) = opts.time_limit {
        options.time_limit = limit;
    }
    if let Some(limit) = opts.iteration_limit {
        options.iteration_limit = limit;
    }

    let result = driver::solve(&problem, &options);

    println!("Run status : {}", result.status);
    if result.status == SolveStatus::Optimal {
        println!("Iterations : {}", result.iterations);
        println!("Objective  : {:.7}", result.objective);
    }
}
