// SolverAdapter: turns a frozen problem snapshot into an integer program,
// runs the configured backend under its resource budget, and maps the raw
// output back into domain terms.

use std::time::Instant;
use tracing::info;

use super::model::{self, build_diagnostics, build_model, ModelHalt};
use super::{BackendFactory, BackendStatus, SolveLimits, SolverConfig};
use crate::domain::{
    OptimizationProblem, OptimizationSolution, SelectionEntry, SolveStatus, SolverBackend,
    SolverError, SolverStatistics,
};
use super::scaling::{scale_value, unscale_value};

pub struct SolverAdapter {
    config: SolverConfig,
}

impl SolverAdapter {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve one problem snapshot.
    ///
    /// Terminal solver verdicts (infeasible, model_invalid, unknown) are
    /// statuses on the returned solution, not errors; `Err` is reserved for
    /// backend malfunctions.
    pub fn solve(&self, problem: &OptimizationProblem) -> Result<OptimizationSolution, SolverError> {
        let mut diagnostics =
            build_diagnostics(problem, self.config.capacity_scale, self.config.kpi_scale);

        let resolved_backend = match self.config.backend {
            SolverBackend::Auto => {
                if cfg!(feature = "highs") {
                    SolverBackend::Highs
                } else {
                    SolverBackend::Microlp
                }
            }
            other => other,
        };
        diagnostics.backend = Some(resolved_backend);

        let ip = match build_model(problem, &diagnostics) {
            Ok(ip) => ip,
            Err(ModelHalt::Infeasible {
                diagnostic,
                message,
            }) => {
                diagnostics.empty_slice = Some(diagnostic);
                return Ok(OptimizationSolution::unsolved(SolveStatus::Infeasible, message)
                    .with_diagnostics(diagnostics));
            }
            Err(ModelHalt::ModelInvalid { message }) => {
                return Ok(
                    OptimizationSolution::unsolved(SolveStatus::ModelInvalid, message)
                        .with_diagnostics(diagnostics),
                );
            }
        };

        let backend = BackendFactory::create(resolved_backend)?;
        let limits = SolveLimits {
            time_limit_secs: self.config.time_limit_secs,
            threads: self.config.threads,
        };
        if limits.time_limit_secs.is_some() && !backend.supports_time_limit() {
            diagnostics.message = Some(format!(
                "{} cannot enforce a time limit; the configured limit was ignored",
                backend.name()
            ));
        }

        let start = Instant::now();
        let outcome = backend.solve(&ip, &limits)?;
        let solve_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            backend = backend.name(),
            variables = ip.variables.len(),
            constraints = ip.constraints.len(),
            solve_time_ms,
            "solver run complete"
        );

        let statistics = SolverStatistics {
            solve_time_ms,
            num_variables: ip.variables.len() as u32,
            num_constraints: ip.constraints.len() as u32,
        };

        let status = match outcome.status {
            BackendStatus::Optimal => SolveStatus::Optimal,
            BackendStatus::Feasible => SolveStatus::Feasible,
            BackendStatus::Infeasible => SolveStatus::Infeasible,
            BackendStatus::Unknown => SolveStatus::Unknown,
        };

        if !status.is_solved() {
            let mut solution = OptimizationSolution::unsolved(
                status,
                format!("{} terminated with status {status}", backend.name()),
            )
            .with_diagnostics(diagnostics);
            solution.statistics = statistics;
            return Ok(solution);
        }

        let picks: Vec<bool> = outcome.values.iter().map(|&v| v > 0.5).collect();
        let selected: Vec<SelectionEntry> = problem
            .candidates
            .iter()
            .zip(&picks)
            .map(|(candidate, &selected)| SelectionEntry {
                initiative_key: candidate.initiative_key.clone(),
                selected,
                allocated_capacity: if selected { candidate.capacity_cost } else { 0.0 },
            })
            .collect();

        // Capacity totals stay in scaled integers until the final division.
        let used_scaled: i64 = problem
            .candidates
            .iter()
            .zip(&picks)
            .filter(|(_, &selected)| selected)
            .map(|(c, _)| scale_value(c.capacity_cost, self.config.capacity_scale))
            .sum();
        let capacity_used = unscale_value(used_scaled, self.config.capacity_scale);

        let objective_value =
            model::objective_value(&problem.candidates, |i| picks[i], &diagnostics);

        Ok(OptimizationSolution {
            status,
            selected,
            objective_value: Some(objective_value),
            capacity_used,
            statistics,
            diagnostics,
        })
    }
}

impl Default for SolverAdapter {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}
