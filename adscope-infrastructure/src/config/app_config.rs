use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use adscope_domain::{
    DecompositionParams, GeneratorConfig, IsolationForestParams, KernelGamma, OneClassSvmParams,
    PipelineConfig, StoragePaths, MAX_DAYS,
};

use super::validation::{validate_fraction, validate_positive};

pub const DEFAULT_CONFIG_PATH: &str = "./adscope.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub raw_events_path: String,
    pub campaign_output_path: String,
    pub daily_output_path: String,
    pub metrics_output_path: String,
    pub compression: String,
    pub log_file: Option<String>,

    pub seed: u64,
    pub rows: usize,
    pub days: u32,
    pub end_date: Option<String>,
    pub campaign_id_min: i64,
    pub campaign_id_max: i64,
    pub impressions_mean: f64,
    pub clicks_mean: f64,
    pub conversion_rate: f64,
    pub revenue_shape: f64,
    pub revenue_scale: f64,
    pub anomaly_rate: f64,
    pub click_multiplier: i64,
    pub revenue_multiplier: f64,

    pub iforest_estimators: usize,
    pub iforest_contamination: f64,
    pub iforest_seed: u64,
    pub iforest_max_samples: Option<usize>,
    pub n_jobs: Option<usize>,

    pub ocsvm_nu: f64,
    pub ocsvm_gamma: String,
    pub ocsvm_tol: f64,
    pub ocsvm_cache_mb: usize,
    pub ocsvm_max_iter: Option<usize>,

    pub stl_period: usize,
    pub stl_robust: bool,
    pub ts_threshold_sigma: f64,

    /// File the values were read from. `None` when running on defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
    /// Environment overrides left out because their value did not parse.
    #[serde(skip)]
    pub ignored_overrides: Vec<IgnoredOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    pub key: String,
    pub value: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let paths = StoragePaths::default();
        let generator = GeneratorConfig::default();
        let forest = IsolationForestParams::default();
        let svm = OneClassSvmParams::default();
        let decomposition = DecompositionParams::default();
        Self {
            raw_events_path: paths.raw_events,
            campaign_output_path: paths.campaign_output,
            daily_output_path: paths.daily_output,
            metrics_output_path: paths.metrics_output,
            compression: "snappy".to_string(),
            log_file: None,
            seed: generator.seed,
            rows: generator.rows,
            days: generator.days,
            end_date: None,
            campaign_id_min: generator.campaign_id_min,
            campaign_id_max: generator.campaign_id_max,
            impressions_mean: generator.impressions_mean,
            clicks_mean: generator.clicks_mean,
            conversion_rate: generator.conversion_rate,
            revenue_shape: generator.revenue_shape,
            revenue_scale: generator.revenue_scale,
            anomaly_rate: generator.anomaly_rate,
            click_multiplier: generator.click_multiplier,
            revenue_multiplier: generator.revenue_multiplier,
            iforest_estimators: forest.n_estimators,
            iforest_contamination: forest.contamination,
            iforest_seed: forest.seed,
            iforest_max_samples: None,
            n_jobs: None,
            ocsvm_nu: svm.nu,
            ocsvm_gamma: "scale".to_string(),
            ocsvm_tol: svm.tol,
            ocsvm_cache_mb: svm.cache_mb,
            ocsvm_max_iter: None,
            stl_period: decomposition.period,
            stl_robust: decomposition.robust,
            ts_threshold_sigma: decomposition.threshold_sigma,
            source: None,
            ignored_overrides: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads the TOML file at `path`, falling back to `ADSCOPE_CONFIG` and
    /// then `./adscope.toml`. A missing file yields the defaults and leaves
    /// `source` empty.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path
            .map(ToString::to_string)
            .or_else(|| env::var("ADSCOPE_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let file_path = Path::new(&path);
        let mut config = if file_path.exists() {
            let content = fs::read_to_string(file_path)
                .with_context(|| format!("failed to read config {}", file_path.display()))?;
            let mut config = Self::from_toml(&content)
                .with_context(|| format!("invalid config {}", file_path.display()))?;
            config.source = Some(file_path.to_path_buf());
            config
        } else {
            AppConfig::default()
        };
        config.apply_env_overrides();
        config.resolve_paths(file_path.parent());
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn normalize(&mut self) {
        self.compression = self.compression.trim().to_ascii_lowercase();
        self.ocsvm_gamma = self.ocsvm_gamma.trim().to_ascii_lowercase();
        if let Some(file) = &self.log_file {
            if file.trim().is_empty() {
                self.log_file = None;
            }
        }
        if let Some(date) = &self.end_date {
            if date.trim().is_empty() {
                self.end_date = None;
            }
        }
        if self.n_jobs == Some(0) {
            self.n_jobs = None;
        }
    }

    pub fn resolve_paths(&mut self, base_dir: Option<&Path>) {
        let Some(base) = base_dir else {
            return;
        };
        self.raw_events_path = resolve_path(base, &self.raw_events_path);
        self.campaign_output_path = resolve_path(base, &self.campaign_output_path);
        self.daily_output_path = resolve_path(base, &self.daily_output_path);
        self.metrics_output_path = resolve_path(base, &self.metrics_output_path);
        if let Some(file) = &self.log_file {
            self.log_file = Some(resolve_path(base, file));
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("raw_events_path", &self.raw_events_path),
            ("campaign_output_path", &self.campaign_output_path),
            ("daily_output_path", &self.daily_output_path),
            ("metrics_output_path", &self.metrics_output_path),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{} must not be empty", name));
            }
        }
        if !matches!(self.compression.as_str(), "snappy" | "uncompressed") {
            return Err(anyhow!("unsupported compression: {}", self.compression));
        }
        if self.days == 0 || self.days > MAX_DAYS {
            return Err(anyhow!("days must be within 1..={}, got {}", MAX_DAYS, self.days));
        }
        self.end_date()?;
        self.kernel_gamma()?;
        validate_fraction("iforest_contamination", self.iforest_contamination, false)?;
        validate_fraction("ocsvm_nu", self.ocsvm_nu, true)?;
        validate_positive("ocsvm_tol", self.ocsvm_tol)?;
        validate_positive("ts_threshold_sigma", self.ts_threshold_sigma)?;
        if self.iforest_estimators == 0 {
            return Err(anyhow!("iforest_estimators must be greater than 0"));
        }
        if self.iforest_max_samples == Some(0) {
            return Err(anyhow!("iforest_max_samples must be greater than 0"));
        }
        if self.stl_period < 2 {
            return Err(anyhow!("stl_period must be at least 2"));
        }
        Ok(())
    }

    pub fn end_date(&self) -> Result<Option<NaiveDate>> {
        self.end_date
            .as_deref()
            .map(|value| {
                NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                    .map_err(|err| anyhow!("invalid end_date {}: {}", value, err))
            })
            .transpose()
    }

    pub fn kernel_gamma(&self) -> Result<KernelGamma> {
        match self.ocsvm_gamma.as_str() {
            "scale" => Ok(KernelGamma::Scale),
            "auto" => Ok(KernelGamma::Auto),
            other => {
                let value: f64 = other.parse().map_err(|_| {
                    anyhow!("ocsvm_gamma must be scale, auto or a number, got {}", other)
                })?;
                validate_positive("ocsvm_gamma", value)?;
                Ok(KernelGamma::Value(value))
            }
        }
    }

    pub fn to_generator_config(&self) -> Result<GeneratorConfig> {
        Ok(GeneratorConfig {
            seed: self.seed,
            rows: self.rows,
            days: self.days,
            end_date: self.end_date()?,
            campaign_id_min: self.campaign_id_min,
            campaign_id_max: self.campaign_id_max,
            impressions_mean: self.impressions_mean,
            clicks_mean: self.clicks_mean,
            conversion_rate: self.conversion_rate,
            revenue_shape: self.revenue_shape,
            revenue_scale: self.revenue_scale,
            anomaly_rate: self.anomaly_rate,
            click_multiplier: self.click_multiplier,
            revenue_multiplier: self.revenue_multiplier,
        })
    }

    pub fn to_pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            isolation_forest: IsolationForestParams {
                n_estimators: self.iforest_estimators,
                contamination: self.iforest_contamination,
                seed: self.iforest_seed,
                max_samples: self.iforest_max_samples,
                n_jobs: self.n_jobs,
            },
            one_class_svm: OneClassSvmParams {
                nu: self.ocsvm_nu,
                gamma: self.kernel_gamma()?,
                tol: self.ocsvm_tol,
                cache_mb: self.ocsvm_cache_mb,
                max_iter: self.ocsvm_max_iter,
            },
            decomposition: DecompositionParams {
                period: self.stl_period,
                robust: self.stl_robust,
                threshold_sigma: self.ts_threshold_sigma,
            },
        })
    }

    pub fn to_storage_paths(&self) -> StoragePaths {
        StoragePaths {
            raw_events: self.raw_events_path.clone(),
            campaign_output: self.campaign_output_path.clone(),
            daily_output: self.daily_output_path.clone(),
            metrics_output: self.metrics_output_path.clone(),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("ADSCOPE_RAW_EVENTS_PATH") {
            self.raw_events_path = value;
        }
        if let Some(value) = lookup("ADSCOPE_CAMPAIGN_OUTPUT_PATH") {
            self.campaign_output_path = value;
        }
        if let Some(value) = lookup("ADSCOPE_DAILY_OUTPUT_PATH") {
            self.daily_output_path = value;
        }
        if let Some(value) = lookup("ADSCOPE_METRICS_OUTPUT_PATH") {
            self.metrics_output_path = value;
        }
        if let Some(value) = lookup("ADSCOPE_COMPRESSION") {
            self.compression = value;
        }
        if let Some(value) = lookup("ADSCOPE_LOG_FILE") {
            self.log_file = Some(value);
        }
        if let Some(value) = lookup("ADSCOPE_END_DATE") {
            self.end_date = Some(value);
        }
        if let Some(value) = lookup("ADSCOPE_OCSVM_GAMMA") {
            self.ocsvm_gamma = value;
        }

        let mut env = Overrides {
            lookup,
            ignored: Vec::new(),
        };
        env.parsed("ADSCOPE_SEED", &mut self.seed);
        env.parsed("ADSCOPE_ROWS", &mut self.rows);
        env.parsed("ADSCOPE_DAYS", &mut self.days);
        env.parsed("ADSCOPE_CAMPAIGN_ID_MIN", &mut self.campaign_id_min);
        env.parsed("ADSCOPE_CAMPAIGN_ID_MAX", &mut self.campaign_id_max);
        env.parsed("ADSCOPE_ANOMALY_RATE", &mut self.anomaly_rate);
        env.parsed("ADSCOPE_IFOREST_ESTIMATORS", &mut self.iforest_estimators);
        env.parsed(
            "ADSCOPE_IFOREST_CONTAMINATION",
            &mut self.iforest_contamination,
        );
        env.parsed("ADSCOPE_IFOREST_SEED", &mut self.iforest_seed);
        env.optional("ADSCOPE_IFOREST_MAX_SAMPLES", &mut self.iforest_max_samples);
        env.optional("ADSCOPE_N_JOBS", &mut self.n_jobs);
        env.parsed("ADSCOPE_OCSVM_NU", &mut self.ocsvm_nu);
        env.parsed("ADSCOPE_OCSVM_TOL", &mut self.ocsvm_tol);
        env.parsed("ADSCOPE_OCSVM_CACHE_MB", &mut self.ocsvm_cache_mb);
        env.optional("ADSCOPE_OCSVM_MAX_ITER", &mut self.ocsvm_max_iter);
        env.parsed("ADSCOPE_STL_PERIOD", &mut self.stl_period);
        env.parsed("ADSCOPE_STL_ROBUST", &mut self.stl_robust);
        env.parsed("ADSCOPE_TS_THRESHOLD_SIGMA", &mut self.ts_threshold_sigma);
        self.ignored_overrides.extend(env.ignored);
    }
}

/// Typed override lookup. Values that fail to parse keep the current setting
/// and are recorded in `ignored`.
struct Overrides<F> {
    lookup: F,
    ignored: Vec<IgnoredOverride>,
}

impl<F> Overrides<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: FromStr>(&mut self, key: &str, target: &mut T) {
        if let Some(value) = (self.lookup)(key) {
            match value.trim().parse() {
                Ok(parsed) => *target = parsed,
                Err(_) => self.ignore(key, value),
            }
        }
    }

    /// Empty values clear the setting.
    fn optional<T: FromStr>(&mut self, key: &str, target: &mut Option<T>) {
        if let Some(value) = (self.lookup)(key) {
            if value.trim().is_empty() {
                *target = None;
                return;
            }
            match value.trim().parse() {
                Ok(parsed) => *target = Some(parsed),
                Err(_) => self.ignore(key, value),
            }
        }
    }

    fn ignore(&mut self, key: &str, value: String) {
        self.ignored.push(IgnoredOverride {
            key: key.to_string(),
            value,
        });
    }
}

fn resolve_path(base: &Path, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        trimmed.to_string()
    } else {
        base.join(path).to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_output_contract() {
        let config = AppConfig::default();
        assert_eq!(config.raw_events_path, "data/raw/events.parquet");
        assert_eq!(
            config.campaign_output_path,
            "data/gold/campaign_daily_anomalies.parquet"
        );
        assert_eq!(
            config.daily_output_path,
            "data/gold/daily_ts_anomalies.parquet"
        );
        assert_eq!(config.metrics_output_path, "runs/metrics.json");
        config.validate().unwrap();

        assert_eq!(
            config.to_generator_config().unwrap(),
            GeneratorConfig::default()
        );
        let pipeline = config.to_pipeline_config().unwrap();
        assert_eq!(pipeline.isolation_forest, IsolationForestParams::default());
        assert_eq!(pipeline.one_class_svm, OneClassSvmParams::default());
        assert_eq!(pipeline.decomposition, DecompositionParams::default());
    }

    #[test]
    fn toml_fields_override_defaults() {
        let config = AppConfig::from_toml(
            r#"
            rows = 5000
            end_date = "2024-03-31"
            ocsvm_gamma = "0.25"
            n_jobs = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.rows, 5000);
        assert_eq!(config.seed, 42);
        assert_eq!(
            config.end_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31)
        );
        assert_eq!(config.kernel_gamma().unwrap(), KernelGamma::Value(0.25));
        assert_eq!(
            config.to_pipeline_config().unwrap().isolation_forest.n_jobs,
            Some(2)
        );
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ADSCOPE_ROWS", "1000"),
            ("ADSCOPE_OCSVM_GAMMA", "auto"),
            ("ADSCOPE_N_JOBS", "4"),
            ("ADSCOPE_METRICS_OUTPUT_PATH", "out/m.json"),
            ("ADSCOPE_DAYS", "not-a-number"),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.rows, 1000);
        assert_eq!(config.days, 90);
        assert_eq!(config.n_jobs, Some(4));
        assert_eq!(config.metrics_output_path, "out/m.json");
        assert_eq!(config.kernel_gamma().unwrap(), KernelGamma::Auto);
        assert_eq!(
            config.ignored_overrides,
            vec![IgnoredOverride {
                key: "ADSCOPE_DAYS".to_string(),
                value: "not-a-number".to_string(),
            }]
        );
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let mut config = AppConfig {
            metrics_output_path: "/abs/metrics.json".to_string(),
            ..AppConfig::default()
        };
        config.resolve_paths(Some(Path::new("/srv/adscope")));
        assert_eq!(
            config.raw_events_path,
            "/srv/adscope/data/raw/events.parquet"
        );
        assert_eq!(config.metrics_output_path, "/abs/metrics.json");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            AppConfig {
                ocsvm_nu: 0.0,
                ..AppConfig::default()
            },
            AppConfig {
                iforest_contamination: 0.7,
                ..AppConfig::default()
            },
            AppConfig {
                ocsvm_gamma: "wide".to_string(),
                ..AppConfig::default()
            },
            AppConfig {
                end_date: Some("31/03/2024".to_string()),
                ..AppConfig::default()
            },
            AppConfig {
                compression: "brotli".to_string(),
                ..AppConfig::default()
            },
            AppConfig {
                daily_output_path: " ".to_string(),
                ..AppConfig::default()
            },
            AppConfig {
                days: MAX_DAYS + 1,
                ..AppConfig::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "accepted {:?}", config);
        }
    }

    #[test]
    fn normalize_clears_blank_options() {
        let mut config = AppConfig {
            log_file: Some("  ".to_string()),
            end_date: Some(String::new()),
            ocsvm_gamma: " Scale ".to_string(),
            n_jobs: Some(0),
            ..AppConfig::default()
        };
        config.normalize();
        assert_eq!(config.log_file, None);
        assert_eq!(config.end_date, None);
        assert_eq!(config.ocsvm_gamma, "scale");
        assert_eq!(config.n_jobs, None);
    }
}
