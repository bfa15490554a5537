//! Stack configuration. All pools are sized here once; nothing is resized at
//! runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetConfig {
    pub timer: TimerConfig,
    pub mldp: MldpConfig,
    pub dns: DnsConfig,
    pub host_name: String,
    /// Seed for the stack's deterministic RNG (MLD query response delays).
    pub rand_seed: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            mldp: MldpConfig::default(),
            dns: DnsConfig::default(),
            host_name: "embernet".into(),
            rand_seed: 1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimerConfig {
    /// The OS scheduler tick rate; must be at least the timer task
    /// frequency, or the task could never be scheduled often enough.
    pub os_tick_hz: u32,
    /// Sweep frequency of the timer task.
    pub task_freq_hz: u32,
    pub pool_capacity: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            os_tick_hz: 1000,
            task_freq_hz: 100,
            pool_capacity: 50,
        }
    }
}

impl TimerConfig {
    /// Sweep period of the timer task.
    pub fn period(&self) -> Duration {
        Duration::from_secs(1) / self.task_freq_hz.max(1)
    }

    /// Ticks of the timer task corresponding to `delay`, rounded up so a
    /// nonzero delay never becomes an immediate expiry.
    pub fn ticks(&self, delay: Duration) -> u64 {
        let nanos = delay.as_nanos();
        let per_tick = self.period().as_nanos().max(1);
        nanos.div_ceil(per_tick).try_into().unwrap_or(u64::MAX)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MldpConfig {
    pub host_grp_capacity: usize,
    pub unsolicited_report_delay_ms: u64,
    pub report_delay_max_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for MldpConfig {
    fn default() -> Self {
        Self {
            host_grp_capacity: 8,
            unsolicited_report_delay_ms: 2000,
            report_delay_max_ms: 10_000,
            retry_delay_ms: 2000,
        }
    }
}

impl MldpConfig {
    pub fn engine_config(&self) -> mld::MldConfig {
        mld::MldConfig {
            unsolicited_report_delay: Duration::from_millis(self.unsolicited_report_delay_ms),
            report_delay_max: Duration::from_millis(self.report_delay_max_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DnsConfig {
    /// Bound on the addresses requested from the resolver per host, and on
    /// the records one `getaddrinfo` call may return.
    pub max_addrs_per_host: usize,
    pub host_name_len_max: usize,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            max_addrs_per_host: 4,
            host_name_len_max: 255,
        }
    }
}

impl NetConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = NetConfig::default();
        assert!(cfg.timer.os_tick_hz >= cfg.timer.task_freq_hz);
        assert_eq!(cfg.timer.period(), Duration::from_millis(10));
    }

    #[test]
    fn ticks_round_up() {
        let timer = TimerConfig {
            os_tick_hz: 1000,
            task_freq_hz: 100,
            pool_capacity: 50,
        };
        assert_eq!(timer.ticks(Duration::from_millis(10)), 1);
        assert_eq!(timer.ticks(Duration::from_millis(15)), 2);
        assert_eq!(timer.ticks(Duration::ZERO), 0);
        assert_eq!(timer.ticks(Duration::from_secs(2)), 200);
    }

    #[test]
    fn yaml_overrides() {
        let cfg = NetConfig::from_yaml_str(
            "timer:\n  task_freq_hz: 10\nhost_name: unit-under-test\n",
        )
        .unwrap();
        assert_eq!(cfg.timer.task_freq_hz, 10);
        assert_eq!(cfg.timer.pool_capacity, 50);
        assert_eq!(cfg.host_name, "unit-under-test");

        assert!(NetConfig::from_yaml_str("no_such_field: 1\n").is_err());
    }
}
