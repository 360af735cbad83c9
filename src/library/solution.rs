//! A compiled kernel variant and its applicability predicates

use std::fmt;

use super::metadata::{Predicates, SolutionEntry};
use crate::hardware::{Capabilities, HardwareDescriptor};
use crate::problem::{ContractionProblem, ProblemType, ScalarCategory};

/// A precompiled kernel able to solve a bounded class of problems
///
/// Owned by [`SolutionLibrary`](super::SolutionLibrary) and handed out by
/// reference.
#[derive(Debug, PartialEq, Eq)]
pub struct Solution {
    index: usize,
    name: String,
    kernel: String,
    architectures: Vec<String>,
    capabilities: Capabilities,
    problem_type: ProblemType,
    predicates: Predicates,
    macro_tile: [u32; 2],
    workgroup: [u32; 3],
    tuned_sizes: Vec<[usize; 4]>,
}

impl Solution {
    pub(super) fn from_entry(index: usize, entry: SolutionEntry) -> Self {
        let capabilities = entry
            .hardware
            .capabilities
            .iter()
            .filter_map(|name| Capabilities::from_name(name))
            .fold(Capabilities::NONE, Capabilities::union);
        Self {
            index,
            name: entry.name,
            kernel: entry.kernel,
            architectures: entry.hardware.architectures,
            capabilities,
            problem_type: entry.problem,
            predicates: entry.predicates,
            macro_tile: entry.macro_tile,
            workgroup: entry.workgroup,
            tuned_sizes: entry.tuned_sizes,
        }
    }

    /// Position in the catalog
    pub fn index(&self) -> usize {
        self.index
    }

    /// Solution name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kernel function symbol
    pub fn kernel(&self) -> &str {
        &self.kernel
    }

    /// Problem type computed by the kernel
    pub fn problem_type(&self) -> &ProblemType {
        &self.problem_type
    }

    /// Output tile per workgroup: [rows, columns]
    pub fn macro_tile(&self) -> [u32; 2] {
        self.macro_tile
    }

    /// Workgroup shape
    pub fn workgroup(&self) -> [u32; 3] {
        self.workgroup
    }

    /// Built for this architecture with every required capability present.
    pub fn supports_hardware(&self, hardware: &HardwareDescriptor) -> bool {
        let arch_ok = self.architectures.is_empty()
            || self.architectures.iter().any(|a| a == hardware.arch());
        arch_ok && hardware.capabilities().contains(self.capabilities)
    }

    /// Problem type matches and every size predicate holds.
    pub fn supports_problem(&self, problem: &ContractionProblem) -> bool {
        if problem.problem_type() != self.problem_type {
            return false;
        }
        let size = problem.size_point();
        let p = &self.predicates;
        let in_bounds = size
            .iter()
            .zip(p.min.as_array())
            .zip(p.max.as_array())
            .all(|((&s, lo), hi)| lo.is_none_or(|lo| s >= lo) && hi.is_none_or(|hi| s <= hi));
        let k_ok = p
            .k_multiple
            .is_none_or(|unroll| problem.bound_size() % unroll == 0);
        let beta_ok = !p.beta_zero_only || problem.beta_category() == ScalarCategory::Zero;
        in_bounds && k_ok && beta_ok
    }

    /// Squared distance from the problem to the nearest tuned size.
    ///
    /// Solutions without tuned sizes are infinitely far away.
    pub fn distance(&self, problem: &ContractionProblem) -> u128 {
        let size = problem.size_point();
        self.tuned_sizes
            .iter()
            .map(|tuned| {
                tuned
                    .iter()
                    .zip(size)
                    .map(|(&t, s)| {
                        let d = t.abs_diff(s) as u128;
                        d * d
                    })
                    .sum::<u128>()
            })
            .min()
            .unwrap_or(u128::MAX)
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kernel)
    }
}
