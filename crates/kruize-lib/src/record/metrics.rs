//! Metric families understood by the service and the CSV columns feeding them

use crate::models::AggregationInfo;

/// Bytes per mebibyte
pub const MEBIBYTE: f64 = 1_048_576.0;

/// A statistic exported per metric, named by the column suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Min,
    Max,
    Sum,
    Avg,
}

impl Stat {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Avg => "avg",
        }
    }
}

/// Unit the service expects for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Cores,
    /// Exported in bytes, sent in MiB
    MiB,
    Percentage,
}

impl MetricUnit {
    pub fn format(self) -> &'static str {
        match self {
            Self::Cores => "cores",
            Self::MiB => "MiB",
            Self::Percentage => "percentage",
        }
    }

    /// Convert an exported value into this unit
    pub fn convert(self, raw: f64) -> f64 {
        match self {
            Self::MiB => raw / MEBIBYTE,
            Self::Cores | Self::Percentage => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    CpuRequest,
    CpuLimit,
    CpuThrottle,
    CpuUsage,
    MemoryRequest,
    MemoryLimit,
    MemoryUsage,
    MemoryRss,
    AcceleratorCoreUsage,
    AcceleratorMemoryUsage,
    AcceleratorFrameBufferUsage,
}

impl MetricKind {
    /// Emission order in a record
    pub const ALL: [MetricKind; 11] = [
        Self::CpuRequest,
        Self::CpuLimit,
        Self::CpuThrottle,
        Self::CpuUsage,
        Self::MemoryRequest,
        Self::MemoryLimit,
        Self::MemoryUsage,
        Self::MemoryRss,
        Self::AcceleratorCoreUsage,
        Self::AcceleratorMemoryUsage,
        Self::AcceleratorFrameBufferUsage,
    ];

    /// Name used in the `updateResults` payload
    pub fn api_name(self) -> &'static str {
        match self {
            Self::CpuRequest => "cpuRequest",
            Self::CpuLimit => "cpuLimit",
            Self::CpuThrottle => "cpuThrottle",
            Self::CpuUsage => "cpuUsage",
            Self::MemoryRequest => "memoryRequest",
            Self::MemoryLimit => "memoryLimit",
            Self::MemoryUsage => "memoryUsage",
            Self::MemoryRss => "memoryRSS",
            Self::AcceleratorCoreUsage => "acceleratorCoreUsage",
            Self::AcceleratorMemoryUsage => "acceleratorMemoryUsage",
            Self::AcceleratorFrameBufferUsage => "acceleratorFrameBufferUsage",
        }
    }

    pub fn column_prefix(self) -> &'static str {
        match self {
            Self::CpuRequest => "cpu_request_container",
            Self::CpuLimit => "cpu_limit_container",
            Self::CpuThrottle => "cpu_throttle_container",
            Self::CpuUsage => "cpu_usage_container",
            Self::MemoryRequest => "memory_request_container",
            Self::MemoryLimit => "memory_limit_container",
            Self::MemoryUsage => "memory_usage_container",
            Self::MemoryRss => "memory_rss_usage_container",
            Self::AcceleratorCoreUsage => "accelerator_core_usage_percentage",
            Self::AcceleratorMemoryUsage => "accelerator_memory_copy_percentage",
            Self::AcceleratorFrameBufferUsage => "accelerator_frame_buffer_usage",
        }
    }

    /// Statistics carried by this metric
    pub fn stats(self) -> &'static [Stat] {
        match self {
            Self::CpuRequest | Self::CpuLimit | Self::MemoryRequest | Self::MemoryLimit => {
                &[Stat::Sum, Stat::Avg]
            }
            Self::CpuThrottle => &[Stat::Sum, Stat::Max, Stat::Avg],
            Self::CpuUsage | Self::MemoryUsage | Self::MemoryRss => {
                &[Stat::Sum, Stat::Min, Stat::Max, Stat::Avg]
            }
            Self::AcceleratorCoreUsage
            | Self::AcceleratorMemoryUsage
            | Self::AcceleratorFrameBufferUsage => &[Stat::Min, Stat::Max, Stat::Avg],
        }
    }

    /// Statistic whose blank cell means the metric was not collected
    pub fn presence(self) -> Stat {
        match self {
            Self::CpuThrottle => Stat::Max,
            _ => Stat::Avg,
        }
    }

    pub fn unit(self) -> MetricUnit {
        match self {
            Self::CpuRequest | Self::CpuLimit | Self::CpuThrottle | Self::CpuUsage => {
                MetricUnit::Cores
            }
            Self::MemoryRequest | Self::MemoryLimit | Self::MemoryUsage | Self::MemoryRss => {
                MetricUnit::MiB
            }
            Self::AcceleratorCoreUsage
            | Self::AcceleratorMemoryUsage
            | Self::AcceleratorFrameBufferUsage => MetricUnit::Percentage,
        }
    }

    pub fn column(self, stat: Stat) -> String {
        format!("{}_{}", self.column_prefix(), stat.suffix())
    }
}

/// Raw (unconverted) statistics read from one row
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sum: Option<f64>,
    pub avg: Option<f64>,
}

impl MetricStats {
    pub fn set(&mut self, stat: Stat, value: f64) {
        let slot = match stat {
            Stat::Min => &mut self.min,
            Stat::Max => &mut self.max,
            Stat::Sum => &mut self.sum,
            Stat::Avg => &mut self.avg,
        };
        *slot = Some(value);
    }

    /// Convert into the payload's unit-tagged form
    pub fn to_aggregation_info(&self, unit: MetricUnit) -> AggregationInfo {
        AggregationInfo {
            min: self.min.map(|v| unit.convert(v)),
            max: self.max.map(|v| unit.convert(v)),
            sum: self.sum.map(|v| unit.convert(v)),
            avg: self.avg.map(|v| unit.convert(v)),
            format: unit.format().to_string(),
        }
    }
}
