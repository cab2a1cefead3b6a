use std::{fmt::Write as _, path::PathBuf, thread};

use chrono::{format::DelayedFormat, DateTime, Local};
use concat_string::concat_string;
use once_cell::sync::Lazy;
use strum::Display;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub mod rotate;

/// 診斷用日誌的目錄
const LOG_DIR: &str = "log";
/// 診斷用日誌單檔上限：10 MB
const DIAGNOSTIC_MAX_SIZE: u64 = 10 * 1024 * 1024;
const DIAGNOSTIC_MAX_BACKUPS: usize = 5;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("default"));

#[derive(Debug, Copy, Clone, Display)]
pub enum Level {
    Info,
    Warn,
    Error,
}

pub struct LogMessage {
    pub level: Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }
}

pub struct Logger {
    writer: UnboundedSender<LogMessage>,
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        let (tx, rx) = unbounded_channel::<LogMessage>();
        let log_path = PathBuf::from(LOG_DIR).join(concat_string!(log_name, ".log"));

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || write_loop(log_path, rx));

        Logger { writer: tx }
    }

    pub fn info(&self, log: String) {
        self.send(Level::Info, log);
    }

    pub fn warn(&self, log: String) {
        self.send(Level::Warn, log);
    }

    pub fn error(&self, log: String) {
        self.send(Level::Error, log);
    }

    fn send(&self, level: Level, msg: String) {
        if let Err(why) = self.writer.send(LogMessage::new(level, msg)) {
            error_console(why.to_string());
        }
    }
}

fn write_loop(log_path: PathBuf, mut rx: UnboundedReceiver<LogMessage>) {
    let mut rotate =
        rotate::Rotate::with_options(log_path, DIAGNOSTIC_MAX_SIZE, DIAGNOSTIC_MAX_BACKUPS);
    let mut line = String::with_capacity(4096);

    while let Some(received) = rx.blocking_recv() {
        append(&mut line, &received);

        // 一次把佇列內的訊息寫完再 flush
        while line.len() < 4096 {
            match rx.try_recv() {
                Ok(more) => append(&mut line, &more),
                Err(_) => break,
            }
        }

        if let Err(why) = rotate.write_msg(line.as_bytes()) {
            error_console(format!(
                "Failed to write to log file. because:{:#?}\r\nmsg:{}",
                why, line
            ));
        }
        rotate.flush();
        line.clear();
    }
}

fn append(line: &mut String, msg: &LogMessage) {
    if writeln!(
        line,
        "{} {} {}",
        msg.created_at.format("%F %X%.6f"),
        msg.level,
        msg.msg
    )
    .is_err()
    {
        error_console(format!("Failed to format a log line: {}", msg.msg));
    }
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    eprintln!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append() {
        let mut line = String::new();
        append(
            &mut line,
            &LogMessage::new(Level::Error, "label mismatch".to_string()),
        );
        assert!(line.ends_with(" Error label mismatch\n"));
    }

    #[tokio::test]
    async fn test_file_async() {
        info_file_async("開始 test_file_async".to_string());
        warn_file_async("warn".to_string());
        error_file_async("結束 test_file_async".to_string());
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}
