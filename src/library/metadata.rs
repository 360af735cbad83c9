//! On-disk schema of the solution catalog
//!
//! The catalog is a single YAML document:
//!
//! ```yaml
//! version: 1
//! solutions:
//!   - name: SGEMM_NN_MT64x64
//!     kernel: Cijk_Ailk_Bljk_S_MT64x64x16
//!     hardware:
//!       architectures: [gfx90a, gfx942]
//!       capabilities: [matrix_cores]
//!     problem:
//!       input: Float
//!       output: Float
//!       scalar: Float
//!     predicates:
//!       min: { m: 64 }
//!       k_multiple: 16
//!     macro_tile: [64, 64]
//!     workgroup: [16, 16, 1]
//!     tuned_sizes: [[1024, 1024, 1, 1024]]
//! ```
//!
//! Parsing is split from validation so both the parse and the structural
//! checks report where the document came from.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hardware::Capabilities;
use crate::problem::ProblemType;

/// Catalog format version understood by this crate
pub const CATALOG_VERSION: u32 = 1;

/// Root of the metadata document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Format version
    pub version: u32,
    /// Solutions in priority order
    #[serde(default)]
    pub solutions: Vec<SolutionEntry>,
}

/// One compiled kernel variant and the problems it accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionEntry {
    /// Unique solution name
    pub name: String,
    /// Kernel function symbol inside the module files
    pub kernel: String,
    /// Hardware the kernel was built for
    #[serde(default)]
    pub hardware: HardwareRequirement,
    /// Problem type the kernel computes
    pub problem: ProblemType,
    /// Size and scalar predicates
    #[serde(default)]
    pub predicates: Predicates,
    /// Output tile computed by one workgroup: [rows, columns]
    pub macro_tile: [u32; 2],
    /// Workgroup shape
    pub workgroup: [u32; 3],
    /// Problem sizes the kernel was tuned on, as [m, n, batch, k]
    #[serde(default)]
    pub tuned_sizes: Vec<[usize; 4]>,
}

/// Hardware predicate of a solution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardwareRequirement {
    /// Accepted architecture identifiers; empty accepts any
    #[serde(default)]
    pub architectures: Vec<String>,
    /// Capability names that must all be present
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Optional per-dimension extents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extents {
    /// Rows of D
    #[serde(default)]
    pub m: Option<usize>,
    /// Columns of D
    #[serde(default)]
    pub n: Option<usize>,
    /// Batch count
    #[serde(default)]
    pub batch: Option<usize>,
    /// Contraction extent
    #[serde(default)]
    pub k: Option<usize>,
}

impl Extents {
    /// Bounds in [m, n, batch, k] order
    pub fn as_array(&self) -> [Option<usize>; 4] {
        [self.m, self.n, self.batch, self.k]
    }
}

/// Size predicates of a solution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicates {
    /// Inclusive lower bounds
    #[serde(default)]
    pub min: Extents,
    /// Inclusive upper bounds
    #[serde(default)]
    pub max: Extents,
    /// The contraction extent must be a multiple of this depth unroll
    #[serde(default)]
    pub k_multiple: Option<usize>,
    /// Kernel never reads C and is only valid for beta == 0
    #[serde(default)]
    pub beta_zero_only: bool,
}

/// Parse catalog YAML; `origin` names the source in errors.
pub fn parse_catalog(yaml: &str, origin: &str) -> Result<Catalog> {
    let catalog: Catalog = serde_yaml::from_str(yaml).map_err(|source| Error::MetadataParse {
        origin: origin.to_string(),
        source,
    })?;
    catalog.validate(origin)?;
    Ok(catalog)
}

impl Catalog {
    /// Structural checks serde cannot express.
    pub fn validate(&self, origin: &str) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidCatalog(format!("{origin}: {msg}")));

        if self.version != CATALOG_VERSION {
            return invalid(format!(
                "unsupported version {} (expected {CATALOG_VERSION})",
                self.version
            ));
        }

        let mut names = HashSet::new();
        for entry in &self.solutions {
            if !names.insert(entry.name.as_str()) {
                return invalid(format!("duplicate solution name '{}'", entry.name));
            }
            if entry.kernel.is_empty() {
                return invalid(format!("solution '{}' has an empty kernel name", entry.name));
            }
            if entry.macro_tile.contains(&0) || entry.workgroup.contains(&0) {
                return invalid(format!(
                    "solution '{}' has a zero tile or workgroup dimension",
                    entry.name
                ));
            }
            if entry.predicates.k_multiple == Some(0) {
                return invalid(format!("solution '{}' has k_multiple 0", entry.name));
            }
            if let Some(unknown) = entry
                .hardware
                .capabilities
                .iter()
                .find(|c| Capabilities::from_name(c).is_none())
            {
                return invalid(format!(
                    "solution '{}' requires unknown capability '{unknown}'",
                    entry.name
                ));
            }
            let bounds = entry
                .predicates
                .min
                .as_array()
                .into_iter()
                .zip(entry.predicates.max.as_array());
            let inverted = |(lo, hi): (Option<usize>, Option<usize>)| {
                matches!((lo, hi), (Some(lo), Some(hi)) if lo > hi)
            };
            if bounds.into_iter().any(inverted) {
                return invalid(format!("solution '{}' has min > max", entry.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::ComputeType;

    const MINIMAL: &str = r#"
version: 1
solutions:
  - name: sgemm_nn
    kernel: Cijk_Ailk_Bljk_S_MT64x64x16
    problem:
      input: Float
      output: Float
      scalar: Float
    macro_tile: [64, 64]
    workgroup: [16, 16, 1]
"#;

    #[test]
    fn test_parse_minimal() {
        let catalog = parse_catalog(MINIMAL, "inline").unwrap();
        assert_eq!(catalog.solutions.len(), 1);
        let entry = &catalog.solutions[0];
        assert_eq!(entry.problem.input, ComputeType::Float);
        assert!(!entry.problem.transpose_a);
        assert!(entry.hardware.architectures.is_empty());
        assert_eq!(entry.predicates, Predicates::default());
        assert!(entry.tuned_sizes.is_empty());
    }

    #[test]
    fn test_parse_full_predicates() {
        let yaml = r#"
version: 1
solutions:
  - name: hgemm_hpa_tn
    kernel: Cijk_Alik_Bljk_HHS_BH_MT128x128x32
    hardware:
      architectures: [gfx90a]
      capabilities: [matrix_cores, packed_math]
    problem:
      input: Half
      output: Half
      scalar: Half
      high_precision_accumulate: true
      transpose_a: true
    predicates:
      min: { m: 128, n: 128 }
      max: { batch: 64 }
      k_multiple: 32
      beta_zero_only: true
    macro_tile: [128, 128]
    workgroup: [16, 16, 1]
    tuned_sizes: [[4096, 4096, 1, 4096]]
"#;
        let catalog = parse_catalog(yaml, "inline").unwrap();
        let entry = &catalog.solutions[0];
        assert!(entry.problem.high_precision_accumulate && entry.problem.transpose_a);
        assert_eq!(entry.predicates.min.m, Some(128));
        assert_eq!(entry.predicates.max.batch, Some(64));
        assert_eq!(entry.predicates.k_multiple, Some(32));
        assert!(entry.predicates.beta_zero_only);
        assert_eq!(entry.tuned_sizes, vec![[4096, 4096, 1, 4096]]);
    }

    #[test]
    fn test_malformed_yaml_names_origin() {
        let err = parse_catalog("version: [", "/lib/SolutionLibrary.yaml").unwrap_err();
        assert!(matches!(err, Error::MetadataParse { .. }));
        assert!(err.to_string().contains("/lib/SolutionLibrary.yaml"));
        assert!(err.is_fatal_init());
    }

    #[test]
    fn test_structural_violations() {
        let wrong_version = MINIMAL.replace("version: 1", "version: 7");
        assert!(matches!(
            parse_catalog(&wrong_version, "x"),
            Err(Error::InvalidCatalog(_))
        ));

        let zero_tile = MINIMAL.replace("[64, 64]", "[0, 64]");
        assert!(parse_catalog(&zero_tile, "x").is_err());

        let duplicated = format!(
            "{MINIMAL}{}",
            MINIMAL.split_once("solutions:\n").unwrap().1
        );
        let err = parse_catalog(&duplicated, "x").unwrap_err();
        assert!(err.to_string().contains("duplicate"), "{err}");
    }

    #[test]
    fn test_unknown_capability_rejected() {
        let yaml = MINIMAL.replace(
            "    problem:",
            "    hardware:\n      capabilities: [warp_drive]\n    problem:",
        );
        let err = parse_catalog(&yaml, "x").unwrap_err();
        assert!(err.to_string().contains("warp_drive"), "{err}");
    }
}
