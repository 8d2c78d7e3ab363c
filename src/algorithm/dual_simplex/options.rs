//! # Solver configuration
//!
//! A plain options struct; the defaults match the solver's tuned behavior
//! and the binary maps command-line flags onto it.

/// Only the dual simplex is implemented; the variant exists so callers
/// state their choice explicitly.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum SimplexStrategy {
    #[default]
    Dual,
}

/// An initial-basis crash is produced by an external collaborator; `Off`
/// starts from the all-logicals basis unless a basis is supplied.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum CrashStrategy {
    #[default]
    Off,
}

/// How the leaving row is priced.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum DualEdgeWeightStrategy {
    /// Dual steepest-edge reference weights.
    #[default]
    SteepestEdge,
    /// Unit weights.
    Dantzig,
}

/// Orientation of the PRICE computation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum PriceStrategy {
    /// Multiply only the nonbasic halves of the rows touched by the BTRAN
    /// result.
    #[default]
    Row,
    /// Dot every structural column against the BTRAN result.
    Col,
}

#[derive(Debug, Clone)]
pub struct SolverOptions {
    pub simplex_strategy: SimplexStrategy,
    pub crash_strategy: CrashStrategy,
    pub dual_edge_weight_strategy: DualEdgeWeightStrategy,
    pub price_strategy: PriceStrategy,
    /// tau_p: basic values beyond their bound by more than this are primal
    /// infeasible.
    pub primal_feasibility_tolerance: f64,
    /// tau_d: reduced costs against their sign by more than this are dual
    /// infeasible.
    pub dual_feasibility_tolerance: f64,
    /// Early exit once the dual objective passes this value.
    pub dual_objective_value_upper_bound: f64,
    pub perturb_costs: bool,
    /// Hard cap on accepted pivots.
    pub iteration_limit: usize,
    /// Product-form chain length that forces a refactorization.
    pub update_limit: usize,
    /// Wall-clock limit in seconds.
    pub time_limit: f64,
    pub transpose_lp: bool,
    pub scale_lp: bool,
    pub permute_lp: bool,
    pub tighten_lp: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            simplex_strategy: SimplexStrategy::Dual,
            crash_strategy: CrashStrategy::Off,
            dual_edge_weight_strategy: DualEdgeWeightStrategy::SteepestEdge,
            price_strategy: PriceStrategy::Row,
            primal_feasibility_tolerance: 1e-7,
            dual_feasibility_tolerance: 1e-7,
            dual_objective_value_upper_bound: f64::INFINITY,
            perturb_costs: true,
            iteration_limit: i32::MAX as usize,
            update_limit: 5000,
            time_limit: f64::INFINITY,
            transpose_lp: false,
            scale_lp: true,
            permute_lp: false,
            tighten_lp: false,
        }
    }
}
