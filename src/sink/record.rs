use std::{path::Path, sync::Mutex};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};

use crate::{
    aggregator::ProductState,
    config::System,
    logging::rotate::Rotate,
    sink::format_fields,
};

/// 定期把產品額度 (不含趨勢符號) 寫進紀錄檔
pub struct Record {
    rotate: Mutex<Rotate>,
}

impl Record {
    pub fn new<P: AsRef<Path>>(path: P, max_bytes: u64, backups: usize) -> Self {
        Record {
            rotate: Mutex::new(Rotate::with_options(path, max_bytes, backups)),
        }
    }

    pub fn from_system(system: &System) -> Self {
        Self::new(&system.log_path, system.log_max_bytes, system.log_backups)
    }

    /// 組出紀錄檔的一行，例如 `"2026-10-19 09:30:00,123  天利鑫B 1000000"`
    pub fn format_line(states: &[ProductState], width: usize, now: DateTime<Local>) -> String {
        let fields = format_fields(states, width, false);
        format!(
            "{}  {}\n",
            now.format("%Y-%m-%d %H:%M:%S,%3f"),
            fields.trim_end()
        )
    }

    pub fn write(&self, states: &[ProductState], width: usize, now: DateTime<Local>) -> Result<()> {
        let line = Self::format_line(states, width, now);
        let mut rotate = self
            .rotate
            .lock()
            .map_err(|why| anyhow!("Failed to lock the record log because {:?}", why))?;
        rotate.write_msg(line.as_bytes()).map_err(|why| {
            anyhow!("Failed to write {} because {:?}", rotate.path().display(), why)
        })?;
        rotate.flush();
        Ok(())
    }

    pub fn flush(&self) {
        if let Ok(mut rotate) = self.rotate.lock() {
            rotate.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        declare::Direction,
        sink::tests::{reading, state},
    };

    #[test]
    fn test_format_line_without_glyph() {
        let now = Local.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
        let states = vec![
            state("1004", Some(reading("天利鑫B", dec!(120), Direction::Up))),
            state("1005", None),
            state("2301187111", Some(reading("天添盈增利1号", dec!(90), Direction::Down))),
        ];

        let line = Record::format_line(&states, 13, now);
        assert_eq!(
            line,
            "2026-10-19 09:30:00,000  天利鑫B 120          天添盈增利1号 90\n"
        );
        assert!(!line.contains('↑'));
        assert!(!line.contains('↓'));
    }

    #[test]
    fn test_write_appends_lines() {
        let dir = std::env::temp_dir().join(format!("quota_monitor_record_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("Monitor.log");
        let record = Record::new(&path, 1024 * 1024, 10);
        let now = Local::now();
        let states = vec![state("1004", Some(reading("天利鑫B", dec!(1), Direction::Flat)))];

        record.write(&states, 13, now).unwrap();
        record.write(&states, 13, now).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().all(|l| l.ends_with("天利鑫B 1")));
        let _ = fs::remove_dir_all(&dir);
    }
}
