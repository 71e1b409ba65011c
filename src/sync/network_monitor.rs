//! # Network Monitor
//!
//! Tracks connectivity and link quality reported by the platform and
//! publishes state changes to subscribers.
//!
//! ## Features
//!
//! - **Connectivity Detection**: Online/offline from the platform signal
//! - **Link Quality**: 2G-class effective type, low downlink or high RTT mark
//!   the link as `Slow`
//! - **Synchronous Fan-out**: Every transition notifies subscribers on the
//!   reporting thread, immediately
//!
//! The monitor only reports. It never retries or triggers work itself.

use crate::shared::{Listeners, OfflineConfig, Subscription};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// Connectivity as seen by the offline core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Connected with adequate link quality
    Online,
    /// No connectivity
    Offline,
    /// Connected over a 2G-class link
    Slow,
}

impl ConnectionState {
    /// Whether the remote can be attempted at all
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionState::Offline)
    }
}

/// Effective connection type as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

impl EffectiveType {
    /// Parse the platform's effective type string
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Some(EffectiveType::Slow2g),
            "2g" => Some(EffectiveType::TwoG),
            "3g" => Some(EffectiveType::ThreeG),
            "4g" => Some(EffectiveType::FourG),
            _ => None,
        }
    }

    fn is_two_g_class(&self) -> bool {
        matches!(self, EffectiveType::Slow2g | EffectiveType::TwoG)
    }
}

/// Optional link quality measurements
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkQuality {
    pub effective_type: Option<EffectiveType>,
    pub downlink_mbps: Option<f64>,
    pub rtt_ms: Option<u32>,
}

/// One reading of the platform connectivity primitive
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySignal {
    pub online: bool,
    pub link: Option<LinkQuality>,
}

impl ConnectivitySignal {
    /// Connected, no link quality information
    pub fn online() -> Self {
        Self { online: true, link: None }
    }

    /// Disconnected
    pub fn offline() -> Self {
        Self { online: false, link: None }
    }

    /// Attach link quality
    pub fn with_link(mut self, link: LinkQuality) -> Self {
        self.link = Some(link);
        self
    }
}

/// Limits below which a connected link counts as slow
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkThresholds {
    pub min_downlink_mbps: f64,
    pub max_rtt_ms: u32,
}

impl Default for LinkThresholds {
    fn default() -> Self {
        Self {
            min_downlink_mbps: 0.15,
            max_rtt_ms: 1400,
        }
    }
}

impl LinkThresholds {
    pub fn from_config(config: &OfflineConfig) -> Self {
        Self {
            min_downlink_mbps: config.slow_downlink_mbps,
            max_rtt_ms: config.slow_rtt_ms,
        }
    }

    /// Classify a signal
    pub fn classify(&self, signal: &ConnectivitySignal) -> ConnectionState {
        if !signal.online {
            return ConnectionState::Offline;
        }
        let Some(link) = signal.link else {
            return ConnectionState::Online;
        };

        let two_g = link.effective_type.is_some_and(|t| t.is_two_g_class());
        let low_downlink = link.downlink_mbps.is_some_and(|d| d < self.min_downlink_mbps);
        let high_rtt = link.rtt_ms.is_some_and(|rtt| rtt > self.max_rtt_ms);

        if two_g || low_downlink || high_rtt {
            ConnectionState::Slow
        } else {
            ConnectionState::Online
        }
    }
}

#[derive(Debug)]
struct MonitorState {
    signal: ConnectivitySignal,
    state: ConnectionState,
}

/// Network monitor with synchronous subscribers
#[derive(Debug)]
pub struct NetworkMonitor {
    thresholds: LinkThresholds,
    current: Mutex<MonitorState>,
    listeners: Listeners<ConnectionState>,
}

impl NetworkMonitor {
    /// Create a monitor from the platform's current reading
    pub fn new(initial: ConnectivitySignal, thresholds: LinkThresholds) -> Self {
        let state = thresholds.classify(&initial);
        tracing::info!("Network monitor starting in {:?}", state);
        Self {
            thresholds,
            current: Mutex::new(MonitorState { signal: initial, state }),
            listeners: Listeners::new(),
        }
    }

    /// Monitor that starts online, with thresholds from the configuration
    pub fn from_config(config: &OfflineConfig) -> Self {
        Self::new(ConnectivitySignal::online(), LinkThresholds::from_config(config))
    }

    /// Feed a new platform reading
    ///
    /// On a state change every subscriber is called before this returns.
    pub fn report(&self, signal: ConnectivitySignal) -> ConnectionState {
        let (previous, next) = {
            let mut current = self.lock();
            let previous = current.state;
            current.signal = signal;
            current.state = self.thresholds.classify(&signal);
            (previous, current.state)
        };

        if previous != next {
            match next {
                ConnectionState::Offline => tracing::warn!("Network: {:?} -> OFFLINE", previous),
                _ => tracing::info!("Network: {:?} -> {:?}", previous, next),
            }
            self.listeners.notify(&next);
        }
        next
    }

    /// Platform online/offline event; keeps the last link quality
    pub fn set_online(&self, online: bool) -> ConnectionState {
        let link = self.lock().signal.link;
        self.report(ConnectivitySignal { online, link })
    }

    /// Platform link quality change; `None` when the signal is unavailable
    pub fn set_link_quality(&self, link: Option<LinkQuality>) -> ConnectionState {
        let online = self.lock().signal.online;
        self.report(ConnectivitySignal { online, link })
    }

    /// Register a state-change callback
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.listeners.subscribe(move |state: &ConnectionState| callback(*state))
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Connected, whether fast or slow
    pub fn is_online(&self) -> bool {
        self.state().is_connected()
    }

    pub fn is_offline(&self) -> bool {
        !self.is_online()
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(ConnectivitySignal::online(), LinkThresholds::default())
    }
}
