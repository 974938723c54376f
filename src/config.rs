use crate::error::{AggregatorError, Result};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Command line of an external generator plus the file it writes before exiting.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub program: String,
    pub args: Vec<String>,
    pub output_path: PathBuf,
    pub timeout: Duration,
}

/// Runtime settings for the aggregator.
///
/// Everything is read from the environment (after `.env` has been loaded by
/// `main`); only the API key is mandatory.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub data_dir: PathBuf,
    pub timezone: Tz,
    pub http_timeout: Duration,
    pub warm_start: bool,
    pub news: GeneratorConfig,
    pub recommender: GeneratorConfig,
}

impl Config {
    /// Builds the configuration from environment variables.
    ///
    /// # Errors
    /// Returns `AggregatorError::Config` if `COINGECKO_API_KEY` is unset or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("COINGECKO_API_KEY")
            .map_err(|_| AggregatorError::Config("COINGECKO_API_KEY must be set".into()))?;

        let data_dir = PathBuf::from(var_or("COIN_CACHE_DATA_DIR", "data"));

        let timezone = Tz::from_str(&var_or("COIN_CACHE_TIMEZONE", DEFAULT_TIMEZONE))
            .map_err(|e| AggregatorError::Config(format!("COIN_CACHE_TIMEZONE: {}", e)))?;

        let generator_timeout = Duration::from_secs(parse_var("GENERATOR_TIMEOUT_SECS", 1800)?);

        let news = GeneratorConfig::from_command(
            &var_or("NEWS_GENERATOR_CMD", "python3 googleNewsScraper.py"),
            env::var("NEWS_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("news").join("newsFeed.txt")),
            generator_timeout,
        )?;

        let recommender = GeneratorConfig::from_command(
            &var_or("RECOMMENDER_CMD", "python3 recommendationSystem.py"),
            env::var("RECOMMENDATIONS_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("metadata").join("recommendations.txt")),
            generator_timeout,
        )?;

        Ok(Self {
            api_key,
            base_url: var_or("COINGECKO_BASE_URL", DEFAULT_BASE_URL),
            timezone,
            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", 30)?),
            warm_start: parse_var("COIN_CACHE_WARM_START", true)?,
            news,
            recommender,
            data_dir,
        })
    }
}

impl GeneratorConfig {
    /// Splits a whitespace separated command line into program and arguments.
    pub fn from_command(command: &str, output_path: PathBuf, timeout: Duration) -> Result<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| AggregatorError::Config(format!("empty generator command for {}", output_path.display())))?;

        Ok(Self {
            program,
            args: parts.collect(),
            output_path,
            timeout,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AggregatorError::Config(format!("{}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_command_split() {
        let cfg = GeneratorConfig::from_command(
            "python3 /opt/scripts/news.py",
            PathBuf::from("/tmp/news.txt"),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(cfg.program, "python3");
        assert_eq!(cfg.args, vec!["/opt/scripts/news.py".to_string()]);
        assert_eq!(cfg.output_path, PathBuf::from("/tmp/news.txt"));
    }

    #[test]
    fn test_generator_command_rejects_blank() {
        let result = GeneratorConfig::from_command("   ", PathBuf::from("out"), Duration::from_secs(1));
        assert!(matches!(result, Err(AggregatorError::Config(_))));
    }

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let value: u64 = parse_var("COIN_CACHE_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
