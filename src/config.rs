/// Typed configuration for delay elements and the task scheduler.
///
/// Every configuration struct validates itself before a component is
/// built from it, so components never run with a negative delay or two
/// tasks sharing an id. `SchedulerConfig::builder()` offers the fluent
/// form; with the `serialize` feature the same structures load from JSON.

use std::collections::BTreeSet;

use crate::error::{KairosError, KairosResult};
use crate::task::{ResourceId, TaskId};
use crate::time::ModelTime;

// ── DelayConfig ───────────────────────────────────────────────────────

/// Parameters shared by the delay components.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DelayConfig<V> {
    /// How far outputs lag their inputs. Must not be negative.
    pub delay: ModelTime,

    /// Output produced while `now < start + delay`, before any delayed
    /// input can exist.
    pub initial_value: Option<V>,
}

impl<V> DelayConfig<V> {
    /// A delay with no initial value.
    pub fn new(delay: ModelTime) -> Self {
        DelayConfig {
            delay,
            initial_value: None,
        }
    }

    pub fn with_initial_value(mut self, value: V) -> Self {
        self.initial_value = Some(value);
        self
    }

    pub fn validate(&self) -> KairosResult<()> {
        if self.delay.is_negative() {
            return Err(KairosError::NegativeDelay { delay: self.delay });
        }
        Ok(())
    }
}

impl<V> Default for DelayConfig<V> {
    /// One model second, no initial value.
    fn default() -> Self {
        DelayConfig::new(ModelTime::from_ticks(crate::time::TICKS_PER_SECOND))
    }
}

// ── TaskConfig ────────────────────────────────────────────────────────

/// Static description of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskConfig {
    pub id: TaskId,
    pub name: String,
    /// Larger runs first.
    pub priority: i32,
    /// Tasks sharing an internal resource never preempt each other.
    #[cfg_attr(feature = "serialize", serde(default))]
    pub internal_resource: Option<ResourceId>,
    /// Activate the task when the scheduler initializes.
    #[cfg_attr(feature = "serialize", serde(default))]
    pub autostart: bool,
}

impl TaskConfig {
    pub fn new(id: u32, name: impl Into<String>, priority: i32) -> Self {
        TaskConfig {
            id: TaskId::new(id),
            name: name.into(),
            priority,
            internal_resource: None,
            autostart: false,
        }
    }

    pub fn with_internal_resource(mut self, resource: u32) -> Self {
        self.internal_resource = Some(ResourceId::new(resource));
        self
    }

    pub fn autostart(mut self) -> Self {
        self.autostart = true;
        self
    }
}

// ── SchedulerConfig ───────────────────────────────────────────────────

/// Tasks and standard resources known to a `TaskScheduler`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerConfig {
    pub tasks: Vec<TaskConfig>,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub resources: Vec<ResourceId>,
}

impl SchedulerConfig {
    /// Start a fluent builder.
    ///
    /// # Example
    /// ```rust
    /// use kairos::config::SchedulerConfig;
    ///
    /// let config = SchedulerConfig::builder()
    ///     .task(1, "control", 10)
    ///     .task(2, "logging", 1)
    ///     .resource(7)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.tasks.len(), 2);
    /// ```
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::new()
    }

    /// Reject duplicate task or resource ids.
    pub fn validate(&self) -> KairosResult<()> {
        let mut ids = BTreeSet::new();
        for task in &self.tasks {
            if !ids.insert(task.id) {
                return Err(KairosError::InvalidConfiguration(format!(
                    "duplicate task id {}",
                    task.id
                )));
            }
        }
        let mut resources = BTreeSet::new();
        for resource in &self.resources {
            if !resources.insert(*resource) {
                return Err(KairosError::InvalidConfiguration(format!(
                    "duplicate resource id {}",
                    resource
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON scheduler description.
    #[cfg(feature = "serialize")]
    pub fn from_json(json: &str) -> KairosResult<Self> {
        let config: SchedulerConfig = serde_json::from_str(json)
            .map_err(|e| KairosError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

// ── SchedulerConfigBuilder ────────────────────────────────────────────

/// Fluent builder for `SchedulerConfig`.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task with default options.
    pub fn task(self, id: u32, name: &str, priority: i32) -> Self {
        self.task_with(TaskConfig::new(id, name, priority))
    }

    /// Add a fully configured task.
    pub fn task_with(mut self, task: TaskConfig) -> Self {
        self.config.tasks.push(task);
        self
    }

    /// Declare a standard resource.
    pub fn resource(mut self, id: u32) -> Self {
        self.config.resources.push(ResourceId::new(id));
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> KairosResult<SchedulerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
