use crate::error::{Error, Result};
use crate::executor::PanicStrategy;
use std::time::Duration;

/// Largest group a launch may request, mirroring common device limits.
pub const MAX_GROUP_SIZE_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Groups are dispatched to the worker pool and run concurrently.
    Parallel,
    /// Groups run one after another on the stream thread.
    Sequential,
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        ExecutionStrategy::Parallel
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: Option<usize>,
    pub strategy: ExecutionStrategy,
    pub max_group_size: usize,
    pub barrier_timeout: Duration,
    pub memory_capacity: usize,
    pub enable_profiling: bool,
    pub pin_workers: bool,
    pub stack_size: Option<usize>,
    pub work_item_stack_size: usize,
    pub thread_name_prefix: String,
    /// What a panicking kernel does to the process.
    pub panic_strategy: PanicStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: None,
            strategy: ExecutionStrategy::default(),
            max_group_size: 256,
            barrier_timeout: Duration::from_secs(5),
            memory_capacity: 1 << 30,
            enable_profiling: true,
            pin_workers: false,
            stack_size: Some(2 * 1024 * 1024),
            work_item_stack_size: 64 * 1024,
            thread_name_prefix: "groupsync".to_string(),
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if self.max_group_size == 0 {
            return Err(Error::config("max_group_size must be > 0"));
        }
        if self.max_group_size > MAX_GROUP_SIZE_LIMIT {
            return Err(Error::config(format!(
                "max_group_size too large (max {})",
                MAX_GROUP_SIZE_LIMIT
            )));
        }

        if self.barrier_timeout.is_zero() {
            return Err(Error::config("barrier_timeout must be non-zero"));
        }

        if self.memory_capacity == 0 {
            return Err(Error::config("memory_capacity must be > 0"));
        }

        if self.work_item_stack_size < 16 * 1024 {
            return Err(Error::config("work_item_stack_size must be at least 16 KiB"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn max_group_size(mut self, size: usize) -> Self {
        self.config.max_group_size = size;
        self
    }

    pub fn barrier_timeout(mut self, timeout: Duration) -> Self {
        self.config.barrier_timeout = timeout;
        self
    }

    pub fn memory_capacity(mut self, bytes: usize) -> Self {
        self.config.memory_capacity = bytes;
        self
    }

    pub fn enable_profiling(mut self, enable: bool) -> Self {
        self.config.enable_profiling = enable;
        self
    }

    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.config.pin_workers = pin;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn work_item_stack_size(mut self, size: usize) -> Self {
        self.config.work_item_stack_size = size;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
