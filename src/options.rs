use crate::algorithms::Error;

/// How the matching engine picks a partner for an unmatched vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingStrategy {
    /// Any unmatched neighbor, drawn from the run's random stream.
    Random,
    /// The unmatched neighbor reached through the heaviest edge.
    HeavyEdge,
    /// Heavy-edge matching; a vertex whose neighbors are all matched may
    /// join the pair of its heaviest neighbor as a community member.
    HeavyEdgeCommunity,
    /// Heavy-edge matching with a brotherly extension: a stranded vertex
    /// joins an adjacent pair when the connecting edge passes the
    /// `davis_brotherly_threshold` ratio test.
    HeavyEdgeBrotherly,
}

/// How the partition is seeded at the coarsest level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessCutType {
    /// Continuous relaxation solved by projected gradient, then rounded.
    GradProj,
    /// Shuffle the vertices, then fill side 0 up to the target weight.
    Random,
    /// Fill side 0 in vertex-id order up to the target weight.
    NaturalOrder,
}

/// Tuning knobs for one partitioning run. Immutable once the run starts.
///
/// `Options::default()` matches the reference settings; construct with
/// struct-update syntax to override individual fields:
///
/// ```
/// use GraphSep::options::Options;
/// let opts = Options { random_seed: 42, num_dances: 2, ..Options::default() };
/// assert!(opts.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    /// Seed for the single random stream used by matching and guessing.
    pub random_seed: u64,

    /// Stop coarsening once the coarse graph has at most this many vertices.
    pub coarsen_limit: usize,
    /// Partner selection rule for the matching engine.
    pub matching_strategy: MatchingStrategy,
    /// Allow community 3-groups for vertices whose neighbors are all matched.
    pub do_community_matching: bool,
    /// Edge-weight ratio gating brotherly 3-groups: a stranded vertex joins
    /// an adjacent pair through edge `e` when `threshold * x[e]` reaches the
    /// vertex's heaviest incident edge weight.
    pub davis_brotherly_threshold: f64,

    /// Seeding rule applied at the coarsest level.
    pub guess_cut_type: GuessCutType,

    /// Number of QP-then-FM rounds run at each uncoarsening level.
    pub num_dances: usize,

    /// Run Fiduccia-Mattheyses boundary refinement.
    pub use_fm: bool,
    /// Consecutive non-improving moves tolerated before a pass gives up.
    pub fm_search_depth: usize,
    /// Heap entries inspected per side when selecting the next move.
    pub fm_consider_count: usize,
    /// Maximum number of FM passes per refinement call.
    pub fm_max_num_refinements: usize,

    /// Run projected-gradient QP refinement.
    pub use_qp_grad_proj: bool,
    /// Relative decrease of the QP objective below which iteration stops.
    pub grad_proj_tolerance: f64,
    /// Maximum projected-gradient iterations per QP call.
    pub grad_proj_iteration_limit: usize,

    /// Desired fraction of the total vertex weight on side 1.
    pub target_split: f64,
    /// Half-width of the weight window around the target inside which cuts
    /// are treated as equally balanced.
    pub soft_split_tolerance: f64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            random_seed: 0,
            coarsen_limit: 64,
            matching_strategy: MatchingStrategy::HeavyEdgeBrotherly,
            do_community_matching: true,
            davis_brotherly_threshold: 2.0,
            guess_cut_type: GuessCutType::GradProj,
            num_dances: 1,
            use_fm: true,
            fm_search_depth: 50,
            fm_consider_count: 3,
            fm_max_num_refinements: 20,
            use_qp_grad_proj: true,
            grad_proj_tolerance: 1e-3,
            grad_proj_iteration_limit: 50,
            target_split: 0.5,
            soft_split_tolerance: 0.0,
        }
    }
}

impl Options {
    /// Reject out-of-range or contradictory settings before any work starts.
    pub fn validate(&self) -> Result<(), Error> {
        if self.coarsen_limit < 2 {
            return Err(Error::InvalidOption("coarsen_limit must be at least 2"));
        }
        if !(self.target_split > 0.0 && self.target_split < 1.0) {
            return Err(Error::InvalidOption("target_split must lie in (0, 1)"));
        }
        if self.soft_split_tolerance < 0.0 {
            return Err(Error::InvalidOption("soft_split_tolerance must be non-negative"));
        }
        // The weight window [lo, hi] must stay inside (0, W).
        if self.soft_split_tolerance >= self.target_split
            || self.soft_split_tolerance >= 1.0 - self.target_split
        {
            return Err(Error::InvalidOption(
                "soft_split_tolerance leaves no admissible weight window",
            ));
        }
        if self.davis_brotherly_threshold < 1.0 {
            return Err(Error::InvalidOption(
                "davis_brotherly_threshold must be at least 1",
            ));
        }
        if self.num_dances == 0 {
            return Err(Error::InvalidOption("num_dances must be positive"));
        }
        if self.use_fm && (self.fm_consider_count == 0 || self.fm_max_num_refinements == 0) {
            return Err(Error::InvalidOption(
                "FM is enabled but its consider count or pass limit is zero",
            ));
        }
        if self.use_qp_grad_proj {
            if self.grad_proj_tolerance < 0.0 {
                return Err(Error::InvalidOption("grad_proj_tolerance must be non-negative"));
            }
            if self.grad_proj_iteration_limit == 0 {
                return Err(Error::InvalidOption(
                    "grad_proj_iteration_limit must be positive",
                ));
            }
        }
        Ok(())
    }

    /// Lower edge of the admissible side-1 weight window for a graph of
    /// total vertex weight `total`.
    pub(crate) fn weight_lo(&self, total: f64) -> f64 {
        (self.target_split - self.soft_split_tolerance) * total
    }

    /// Upper edge of the admissible side-1 weight window.
    pub(crate) fn weight_hi(&self, total: f64) -> f64 {
        (self.target_split + self.soft_split_tolerance) * total
    }
}
