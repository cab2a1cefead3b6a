use std::{env, sync::Arc};

use anyhow::Result;

use crate::{config::App, context::AppContext, scheduler::Scheduler};

/// 產品狀態與趨勢
pub mod aggregator;
/// 設定檔
pub mod config;
/// 執行期間共用的狀態
pub mod context;
/// 各銀行的額度查詢
pub mod crawler;
pub mod declare;
pub mod error;
/// 日誌
pub mod logging;
/// 排程
pub mod scheduler;
/// 畫面與紀錄檔輸出
pub mod sink;
pub mod trend;
/// 工具
pub mod util;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let app = App::load()?;
    let ctx = Arc::new(AppContext::new(app)?);

    let msg = format!(
        "Monitor 已啟動 Rust OS/Arch: {}/{}",
        env::consts::OS,
        env::consts::ARCH
    );
    logging::info_file_async(msg.clone());
    logging::info_console(msg);

    let mut scheduler = Scheduler::new(Arc::clone(&ctx));
    scheduler.start();
    scheduler
        .run_until(async {
            if let Err(why) = tokio::signal::ctrl_c().await {
                logging::error_file_async(format!("Failed to listen for ctrl_c because {:?}", why));
            }
        })
        .await;

    ctx.record.flush();
    // 讓終端機的提示字元不會接在覆寫中的那一行後面
    println!();
    logging::info_file_async("Monitor 已停止".to_string());

    Ok(())
}
