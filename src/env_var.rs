use std::sync::OnceLock;

use serde::Deserialize;

fn default_num_pes() -> usize {
    1
}

fn default_deadlock_timeout() -> f64 {
    600.0
}

fn default_matrix_a() -> String {
    "data/matrix_a.csv".to_owned()
}

fn default_matrix_b() -> String {
    "data/matrix_b.csv".to_owned()
}

fn default_matrix_c() -> String {
    "data/matrix_result.csv".to_owned()
}

#[derive(Deserialize, Debug)]
pub struct Config {
    /// Number of PEs in the job, default: 1
    #[serde(default = "default_num_pes")]
    pub num_pes: usize,

    /// The rank of this process within the job.
    ///
    /// Unset means this process is the launcher: it spawns `num_pes` copies
    /// of itself with `LAMINA_PE_ID` set to 0..num_pes.
    pub pe_id: Option<usize>,

    /// Identifier shared by every PE of one job, used to name the shared
    /// memory segments. Set by the launcher; defaults to 0.
    pub job_id: Option<usize>,

    /// Seconds a PE spins in a barrier before printing a potential-deadlock
    /// warning, default: 600.0 seconds
    #[serde(default = "default_deadlock_timeout")]
    pub deadlock_timeout: f64,

    /// Path of the left operand A, default: data/matrix_a.csv
    #[serde(default = "default_matrix_a")]
    pub matrix_a: String,

    /// Path of the right operand B, default: data/matrix_b.csv
    #[serde(default = "default_matrix_b")]
    pub matrix_b: String,

    /// Path the result C is written to, default: data/matrix_result.csv
    #[serde(default = "default_matrix_c")]
    pub matrix_c: String,
}

/// Get the current Environment Variable configuration
pub fn config() -> &'static Config {
    static CONFIG: OnceLock<Config> = OnceLock::new();
    CONFIG.get_or_init(|| match envy::prefixed("LAMINA_").from_env::<Config>() {
        Ok(config) => config,
        Err(error) => panic!("{}", error),
    })
}
