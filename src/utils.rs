/// A default seed for seeded runs.
pub const DEFAULT_SEED: u64 = 0x123456789abcdef;

/// Resident memory of the current process in MiB.
///
/// Reads `/proc/self/statm`; reports 0.0 on platforms without procfs.
pub fn memuse() -> f64 {
    #[cfg(target_os = "linux")]
    {
        if let Some(rss) = std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|statm| {
                statm
                    .split_whitespace()
                    .nth(1)
                    .and_then(|field| field.parse::<f64>().ok())
            })
        {
            return rss * 4096.0 / (1024.0 * 1024.0);
        }
        0.0
    }
    #[cfg(not(target_os = "linux"))]
    {
        0.0
    }
}
