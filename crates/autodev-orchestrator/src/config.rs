use autodev_core::{AutodevError, AutodevResult, TaskType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-type feature flags. A disabled type has no agent, no processor and
/// cannot be added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub enable_research: bool,
    #[serde(default = "default_true")]
    pub enable_frontend: bool,
    #[serde(default = "default_true")]
    pub enable_backend: bool,
    #[serde(default = "default_true")]
    pub enable_database: bool,
    #[serde(default = "default_true")]
    pub enable_testing: bool,
    #[serde(default = "default_true")]
    pub enable_deployment: bool,
    #[serde(default = "default_true", alias = "enable_uiux")]
    pub enable_ui_ux: bool,
    #[serde(default = "default_true")]
    pub enable_portal: bool,
    #[serde(default = "default_true")]
    pub enable_api: bool,
    #[serde(default = "default_true")]
    pub enable_security: bool,
}

impl FeatureFlags {
    pub fn all_enabled() -> Self {
        Self::only(&TaskType::ALL)
    }

    /// Flags with exactly `types` enabled.
    pub fn only(types: &[TaskType]) -> Self {
        let mut flags = Self {
            enable_research: false,
            enable_frontend: false,
            enable_backend: false,
            enable_database: false,
            enable_testing: false,
            enable_deployment: false,
            enable_ui_ux: false,
            enable_portal: false,
            enable_api: false,
            enable_security: false,
        };
        for t in types {
            *flags.flag_mut(*t) = true;
        }
        flags
    }

    pub fn with(mut self, task_type: TaskType, enabled: bool) -> Self {
        *self.flag_mut(task_type) = enabled;
        self
    }

    pub fn is_enabled(&self, task_type: TaskType) -> bool {
        match task_type {
            TaskType::Research => self.enable_research,
            TaskType::Frontend => self.enable_frontend,
            TaskType::Backend => self.enable_backend,
            TaskType::Database => self.enable_database,
            TaskType::Testing => self.enable_testing,
            TaskType::Deployment => self.enable_deployment,
            TaskType::UiUx => self.enable_ui_ux,
            TaskType::Portal => self.enable_portal,
            TaskType::Api => self.enable_api,
            TaskType::Security => self.enable_security,
        }
    }

    pub fn enabled_types(&self) -> Vec<TaskType> {
        TaskType::ALL
            .into_iter()
            .filter(|t| self.is_enabled(*t))
            .collect()
    }

    fn flag_mut(&mut self, task_type: TaskType) -> &mut bool {
        match task_type {
            TaskType::Research => &mut self.enable_research,
            TaskType::Frontend => &mut self.enable_frontend,
            TaskType::Backend => &mut self.enable_backend,
            TaskType::Database => &mut self.enable_database,
            TaskType::Testing => &mut self.enable_testing,
            TaskType::Deployment => &mut self.enable_deployment,
            TaskType::UiUx => &mut self.enable_ui_ux,
            TaskType::Portal => &mut self.enable_portal,
            TaskType::Api => &mut self.enable_api,
            TaskType::Security => &mut self.enable_security,
        }
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::all_enabled()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Queue a testing task when code quality drops below the threshold.
    #[serde(default)]
    pub remediation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Wall-clock milliseconds a simulated processor spends per estimated minute.
    #[serde(default = "default_millis_per_minute")]
    pub millis_per_minute: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            millis_per_minute: default_millis_per_minute(),
        }
    }
}

/// Engine configuration. Every field has a default so partial TOML is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub features: FeatureFlags,
    /// Scheduler tick period.
    #[serde(default = "default_monitoring_interval_ms")]
    pub monitoring_interval_ms: u64,
    /// Concurrency ceiling on in-progress tasks.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    #[serde(default = "default_true")]
    pub auto_deploy: bool,
    /// Minimum acceptable quality score, 0–100.
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    /// Age after which a pending, ineligible task is reported as stalled.
    #[serde(default = "default_stall_warning_minutes")]
    pub stall_warning_minutes: u64,
    #[serde(default = "default_true")]
    pub seed_initial_tasks: bool,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_true() -> bool {
    true
}
fn default_monitoring_interval_ms() -> u64 {
    60_000
}
fn default_max_concurrent_tasks() -> usize {
    10
}
fn default_quality_threshold() -> f64 {
    80.0
}
fn default_stall_warning_minutes() -> u64 {
    60
}
fn default_millis_per_minute() -> u64 {
    10
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            features: FeatureFlags::default(),
            monitoring_interval_ms: default_monitoring_interval_ms(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            auto_deploy: true,
            quality_threshold: default_quality_threshold(),
            stall_warning_minutes: default_stall_warning_minutes(),
            seed_initial_tasks: true,
            quality: QualityConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    pub fn with_monitoring_interval(mut self, interval: Duration) -> Self {
        self.monitoring_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_auto_deploy(mut self, enabled: bool) -> Self {
        self.auto_deploy = enabled;
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn with_seed_initial_tasks(mut self, seed: bool) -> Self {
        self.seed_initial_tasks = seed;
        self
    }

    pub fn with_stall_warning_minutes(mut self, minutes: u64) -> Self {
        self.stall_warning_minutes = minutes;
        self
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_millis(self.monitoring_interval_ms)
    }

    pub fn validate(&self) -> AutodevResult<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(AutodevError::Config(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.monitoring_interval_ms == 0 {
            return Err(AutodevError::Config(
                "monitoring_interval_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.quality_threshold) {
            return Err(AutodevError::Config(format!(
                "quality_threshold must be within 0-100, got {}",
                self.quality_threshold
            )));
        }
        Ok(())
    }
}
