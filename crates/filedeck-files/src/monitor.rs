//! Host resource snapshots for the system-info endpoint

use std::path::Path;

use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use tokio::sync::Mutex;

use filedeck_types::SystemInfoReport;

/// Samples host CPU, memory, disk and uptime figures.
///
/// CPU usage needs two samples a short interval apart, so `report` awaits
/// between refreshes and keeps the sampled [`System`] behind a mutex.
pub struct SystemMonitor {
    system: Mutex<System>,
}

impl SystemMonitor {
    pub fn new() -> Self {
        let refresh = RefreshKind::new()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());
        Self {
            system: Mutex::new(System::new_with_specifics(refresh)),
        }
    }

    /// Take a fresh utilization snapshot
    pub async fn report(&self) -> SystemInfoReport {
        let mut system = self.system.lock().await;

        system.refresh_cpu_usage();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_cpu_usage();
        let cpus = system.cpus();
        let cpu = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        system.refresh_memory();
        let memory = percent(system.used_memory(), system.total_memory());

        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == Path::new("/"))
            .or_else(|| disks.list().first())
            .map(|disk| {
                let total = disk.total_space();
                percent(total.saturating_sub(disk.available_space()), total)
            })
            .unwrap_or(0.0);

        SystemInfoReport {
            cpu: format!("{:.1}%", cpu),
            memory: format!("{:.1}%", memory),
            disk: format!("{:.1}%", disk),
            uptime: System::uptime(),
        }
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_percent(value: &str) -> f64 {
        value
            .strip_suffix('%')
            .expect("percent suffix")
            .parse()
            .expect("numeric percent")
    }

    #[test]
    fn test_percent_handles_zero_totals() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }

    #[tokio::test]
    async fn test_report_yields_percent_strings() {
        let monitor = SystemMonitor::new();
        let report = monitor.report().await;

        assert!(parse_percent(&report.cpu) >= 0.0);
        assert!(parse_percent(&report.memory) >= 0.0);
        assert!(parse_percent(&report.disk) >= 0.0);
    }
}
