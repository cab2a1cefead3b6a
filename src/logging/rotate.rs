use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Result;
use rayon::prelude::*;

use crate::logging;

/// 預設單檔最大大小：1 MB
pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024;
/// 預設保留的備份數量
pub const DEFAULT_MAX_BACKUPS: usize = 10;

/// 依檔案大小輪轉的寫入器
///
/// 目前寫入的檔案固定為 `path`，超過 `max_size` 時依序改名：
/// `app.log` → `app.log.1` → `app.log.2` ...，最多保留 `max_backups` 份。
pub struct Rotate {
    /// 目前寫入的檔案，例如 "log/Monitor.log"
    path: PathBuf,
    /// 檔案輸出 handle
    out_fh: Option<BufWriter<File>>,
    /// 單檔最大大小 (bytes)
    max_size: u64,
    /// 最多保留幾份備份
    max_backups: usize,
    /// 當前檔案已寫入大小
    current_size: u64,
}

impl Rotate {
    /// 使用自訂設定建立 Rotate 實例
    ///
    /// # Arguments
    /// * `path` - 檔名，例如 "log/Monitor.log"
    /// * `max_size` - 單檔最大大小 (bytes)
    /// * `max_backups` - 保留的備份數量
    pub fn with_options<P: AsRef<Path>>(path: P, max_size: u64, max_backups: usize) -> Self {
        Rotate {
            path: path.as_ref().to_path_buf(),
            out_fh: None,
            max_size,
            max_backups,
            current_size: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 寫入日誌訊息，自動處理大小檢查和輪轉
    pub fn write_msg(&mut self, msg: &[u8]) -> Result<()> {
        if self.out_fh.is_none() {
            self.open_file()?;
        }

        if self.should_rotate_by_size(msg.len()) {
            self.rotate()?;
        }

        if let Some(ref mut writer) = self.out_fh {
            writer.write_all(msg)?;
            self.current_size += msg.len() as u64;
        }

        Ok(())
    }

    /// flush 當前檔案
    pub fn flush(&mut self) {
        if let Some(ref mut writer) = self.out_fh {
            if let Err(why) = writer.flush() {
                logging::error_console(format!(
                    "Failed to flush {}. because:{:?}",
                    self.path.display(),
                    why
                ));
            }
        }
    }

    /// 產生備份檔名，例如 generation = 2: "log/Monitor.log.2"
    fn backup_path(&self, generation: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", generation));
        PathBuf::from(name)
    }

    /// 檢查是否需要因大小超限而輪轉，空檔案不輪轉
    fn should_rotate_by_size(&self, additional_bytes: usize) -> bool {
        self.max_size > 0
            && self.current_size > 0
            && self.current_size + additional_bytes as u64 > self.max_size
    }

    fn open_file(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // 取得現有檔案大小
        self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.out_fh = Some(BufWriter::with_capacity(4096, file));

        Ok(())
    }

    /// 執行輪轉：關閉目前檔案、備份依序往後移、開啟新檔案
    fn rotate(&mut self) -> Result<()> {
        self.flush();
        self.out_fh = None;

        if self.max_backups == 0 {
            fs::remove_file(&self.path)?;
        } else {
            for generation in (1..self.max_backups).rev() {
                let from = self.backup_path(generation);
                if from.exists() {
                    fs::rename(&from, self.backup_path(generation + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }

        self.cleanup_surplus_backups();
        self.current_size = 0;
        self.open_file()
    }

    /// 清理超過 `max_backups` 的舊備份 (例如設定調小之後留下的檔案)
    fn cleanup_surplus_backups(&self) {
        let to_unlink = match self.surplus_backups() {
            Ok(files) => files,
            Err(why) => {
                logging::error_console(format!(
                    "Failed to list the backups of {} because {:?}",
                    self.path.display(),
                    why
                ));
                return;
            }
        };

        to_unlink
            .par_iter()
            .with_min_len(num_cpus::get())
            .for_each(|unlink| {
                if let Err(why) = fs::remove_file(unlink) {
                    logging::error_console(format!(
                        "couldn't remove the file({}). because {:?}",
                        unlink.display(),
                        why
                    ));
                }
            });
    }

    fn surplus_backups(&self) -> std::io::Result<Vec<PathBuf>> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = match self.path.file_name().and_then(|n| n.to_str()) {
            Some(name) => format!("{}.", name),
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(parent)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let generation = name
                .strip_prefix(&prefix)
                .and_then(|g| g.parse::<usize>().ok());
            if matches!(generation, Some(g) if g > self.max_backups) {
                files.push(entry.path());
            }
        }

        Ok(files)
    }
}

impl Drop for Rotate {
    fn drop(&mut self) {
        self.flush();
    }
}
