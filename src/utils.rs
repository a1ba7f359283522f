use std::time::Duration;

/// 进度估算的上限，真实结果返回前不会到 100
pub const PROGRESS_CAP: f64 = 95.0;

/// 格式化字节数
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const UNIT_SIZE: f64 = 1024.0;

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= UNIT_SIZE && unit_index < UNITS.len() - 1 {
        size /= UNIT_SIZE;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// 格式化速度
pub fn format_speed(bytes_per_second: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_second as u64))
}

/// 按经过时间估算进度百分比，封顶 [`PROGRESS_CAP`]
pub fn estimate_progress(elapsed: Duration, expected: Duration) -> f64 {
    if expected.is_zero() {
        return PROGRESS_CAP;
    }

    let ratio = elapsed.as_secs_f64() / expected.as_secs_f64();
    (ratio * 100.0).min(PROGRESS_CAP)
}

/// 按估算进度推出传输速度（字节/秒）
pub fn estimate_rate(size: u64, progress: f64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }

    (size as f64 * (progress / 100.0)) / secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(1024.0), "1.00 KB/s");
        assert_eq!(format_speed(0.0), "0.00 B/s");
    }

    #[test]
    fn test_estimate_progress_caps_at_95() {
        let expected = Duration::from_secs(3);

        assert_eq!(estimate_progress(Duration::ZERO, expected), 0.0);

        // 一半时间，一半进度
        let half = estimate_progress(Duration::from_millis(1500), expected);
        assert!((half - 50.0).abs() < 1e-9);

        // 超过预期时间后停在上限
        assert_eq!(estimate_progress(Duration::from_secs(3), expected), PROGRESS_CAP);
        assert_eq!(estimate_progress(Duration::from_secs(60), expected), PROGRESS_CAP);
    }

    #[test]
    fn test_estimate_rate() {
        // 10 秒传了 50%，相当于每秒 5% 的字节量
        let rate = estimate_rate(1000, 50.0, Duration::from_secs(10));
        assert!((rate - 50.0).abs() < 1e-9);

        // 刚开始时不产生 NaN
        assert_eq!(estimate_rate(1000, 0.0, Duration::ZERO), 0.0);
    }
}
