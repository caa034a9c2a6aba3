//! Host utilisation sampling
//!
//! Reads global CPU, memory and disk utilisation through `sysinfo` and
//! keeps a rolling window of samples that forms the scoring batch.

use super::{MetricSource, SampleWindow};
use crate::models::MetricSample;
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use sysinfo::{Disks, System};
use tokio::sync::Mutex;
use tracing::debug;

/// Configuration for the host collector
#[derive(Debug, Clone, Deserialize)]
pub struct SystemCollectorConfig {
    /// Number of recent samples scored per pass
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Mount point whose disk usage is reported
    #[serde(default = "default_disk_mount")]
    pub disk_mount: PathBuf,
}

fn default_window_size() -> usize {
    30
}

fn default_disk_mount() -> PathBuf {
    PathBuf::from("/")
}

impl Default for SystemCollectorConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            disk_mount: default_disk_mount(),
        }
    }
}

/// Collector for host-wide resource utilisation
pub struct SystemCollector {
    system: Mutex<System>,
    disks: Mutex<Disks>,
    disk_mount: PathBuf,
    window: Mutex<SampleWindow>,
}

impl SystemCollector {
    pub fn new(config: SystemCollectorConfig) -> Self {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes; prime the first one
        system.refresh_cpu();
        system.refresh_memory();

        Self {
            system: Mutex::new(system),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            disk_mount: config.disk_mount,
            window: Mutex::new(SampleWindow::new(config.window_size)),
        }
    }

    /// Take one utilisation snapshot without touching the window
    pub async fn sample(&self) -> Result<MetricSample> {
        let (cpu, memory) = {
            let mut system = self.system.lock().await;
            system.refresh_cpu();
            system.refresh_memory();

            let total = system.total_memory();
            if total == 0 {
                bail!("host reports zero total memory");
            }
            let cpu = system.global_cpu_info().cpu_usage() as f64;
            let memory = system.used_memory() as f64 / total as f64 * 100.0;
            (cpu, memory)
        };

        let disk = {
            let mut disks = self.disks.lock().await;
            disks.refresh();
            let disk = disks
                .list()
                .iter()
                .filter(|d| self.disk_mount.starts_with(d.mount_point()))
                .max_by_key(|d| d.mount_point().as_os_str().len());
            match disk {
                Some(d) => disk_usage_percent(d.total_space(), d.available_space())
                    .ok_or_else(|| anyhow::anyhow!("disk at {:?} reports zero size", d.mount_point()))?,
                None => bail!("no disk mounted at {:?}", self.disk_mount),
            }
        };

        let sample = MetricSample::system(
            chrono::Utc::now().timestamp(),
            cpu.clamp(0.0, 100.0),
            memory.clamp(0.0, 100.0),
            disk,
        );
        debug!(cpu = cpu, memory = memory, disk = disk, "Sampled host utilisation");
        Ok(sample)
    }

    pub fn disk_mount(&self) -> &Path {
        &self.disk_mount
    }
}

#[async_trait]
impl MetricSource for SystemCollector {
    async fn collect(&self) -> Result<Vec<MetricSample>> {
        let sample = self.sample().await?;
        let mut window = self.window.lock().await;
        window.push(sample);
        Ok(window.snapshot())
    }
}

/// Used-space percentage, `None` for a zero-sized disk
pub fn disk_usage_percent(total: u64, available: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some((used as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}
