use clap::Parser;

/// rKind model checker
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// global wall-clock timeout in seconds
    #[arg(long, default_value_t = 100)]
    pub timeout: u64,

    /// max depth for bounded search
    #[arg(long = "max-k", default_value_t = usize::MAX)]
    pub max_k: usize,

    /// disable the k-induction engine
    #[arg(long = "no-kind", default_value_t = false)]
    pub no_kind: bool,

    /// disable invariant discovery
    #[arg(long = "no-invgen", default_value_t = false)]
    pub no_invgen: bool,

    /// minimize the invariant set attached to each proof before reporting
    #[arg(long = "reduce-inv", default_value_t = false)]
    pub reduce_inv: bool,

    /// smooth counterexamples before reporting
    #[arg(long, default_value_t = false)]
    pub smooth: bool,

    /// generalize counterexample values to intervals
    #[arg(long, default_value_t = false)]
    pub interval: bool,

    /// compute a minimal inductive validity core for each valid property
    #[arg(long, default_value_t = false)]
    pub ivc: bool,

    /// per-candidate time budget for ivc reduction in seconds
    #[arg(long = "ivc-timeout", default_value_t = 5)]
    pub ivc_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config::parse_from([""])
    }
}
