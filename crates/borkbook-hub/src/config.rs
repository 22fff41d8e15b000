use borkbook_notify::provider::DEFAULT_FCM_ENDPOINT;
use borkbook_storage::DEFAULT_SUBJECTS;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "0.0.0.0:4444";
pub const DEFAULT_MEALS_FILE: &str = "./meals.json";

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: String,
    pub meals_file: PathBuf,
    pub subjects: Vec<String>,
    pub debug: bool,
    pub log_dir: String,
    pub fcm_project: String,
    pub fcm_token: String,
    pub fcm_endpoint: String,
    pub push_timeout: Duration,
}

#[derive(Parser, Debug, Default)]
#[command(name = "borkbook-hub")]
pub struct Args {
    #[arg(long, default_value = "")]
    pub addr: String,
    #[arg(long, default_value = "")]
    pub meals_file: String,
    /// Comma-separated subjects used when synthesizing or resetting the schedule.
    #[arg(long, default_value = "")]
    pub subjects: String,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
    #[arg(long, default_value = "")]
    pub log_dir: String,
    #[arg(long, default_value = "")]
    pub fcm_project: String,
    #[arg(long, default_value = "")]
    pub fcm_token: String,
    #[arg(long, default_value = "")]
    pub fcm_endpoint: String,
    #[arg(long, default_value_t = 10)]
    pub push_timeout: u64,
}

pub fn load_config() -> Config {
    Config::from_args(Args::parse())
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        let subjects = parse_subjects(&resolve(&args.subjects, "BORKBOOK_SUBJECTS", ""));
        Config {
            addr: resolve(&args.addr, "BORKBOOK_ADDR", DEFAULT_ADDR),
            meals_file: PathBuf::from(resolve(
                &args.meals_file,
                "BORKBOOK_MEALS_FILE",
                DEFAULT_MEALS_FILE,
            )),
            subjects,
            debug: args.debug || env_true("BORKBOOK_DEBUG"),
            log_dir: resolve(&args.log_dir, "BORKBOOK_LOG_DIR", ""),
            fcm_project: resolve(&args.fcm_project, "BORKBOOK_FCM_PROJECT", ""),
            fcm_token: resolve(&args.fcm_token, "BORKBOOK_FCM_TOKEN", ""),
            fcm_endpoint: resolve(
                &args.fcm_endpoint,
                "BORKBOOK_FCM_ENDPOINT",
                DEFAULT_FCM_ENDPOINT,
            ),
            push_timeout: Duration::from_secs(args.push_timeout.max(1)),
        }
    }

    pub fn push_enabled(&self) -> bool {
        !self.fcm_project.trim().is_empty()
    }
}

/// Flag wins, then the environment variable, then the default.
fn resolve(flag: &str, env_key: &str, default: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.trim().to_string();
    }
    if let Ok(value) = std::env::var(env_key) {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }
    default.to_string()
}

pub fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

fn parse_subjects(raw: &str) -> Vec<String> {
    let mut subjects: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        if !subjects.iter().any(|existing| existing == name) {
            subjects.push(name.to_string());
        }
    }
    if subjects.is_empty() {
        return DEFAULT_SUBJECTS.iter().map(|name| name.to_string()).collect();
    }
    subjects
}
