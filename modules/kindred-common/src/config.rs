use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // Web server
    pub api_host: String,
    pub api_port: u16,

    // Named engine resources (create-or-replace targets)
    pub graph_name: String,
    pub pipeline_name: String,
    pub model_name: String,

    /// How many predictions to keep when materializing the table.
    pub prediction_top_n: usize,

    /// Node property that similar pairs must share (e.g. `gender`).
    /// `None` disables the cohort restriction.
    pub similarity_cohort_property: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            neo4j_uri: required_env("NEO4J_URI"),
            neo4j_user: required_env("NEO4J_USER"),
            neo4j_password: required_env("NEO4J_PASSWORD"),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("API_PORT must be a number"),
            graph_name: env::var("GRAPH_NAME").unwrap_or_else(|_| "kindred".to_string()),
            pipeline_name: env::var("PIPELINE_NAME")
                .unwrap_or_else(|_| "kindred-pipe".to_string()),
            model_name: env::var("MODEL_NAME")
                .unwrap_or_else(|_| "kindred-link-model".to_string()),
            prediction_top_n: env::var("PREDICTION_TOP_N")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .expect("PREDICTION_TOP_N must be a number"),
            similarity_cohort_property: match env::var("SIMILARITY_COHORT_PROPERTY") {
                Ok(v) if v.is_empty() => None,
                Ok(v) => Some(v),
                Err(_) => Some("gender".to_string()),
            },
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
