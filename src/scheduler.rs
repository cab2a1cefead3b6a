use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinSet,
    time,
};

use crate::{context::AppContext, logging};

/// 需要各自排程的工作
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Job {
    /// 依來源的輪詢間隔抓取一個產品
    Product(String),
    /// 定期檢查來源的登入狀態
    Probe(String),
}

pub struct Scheduler {
    ctx: Arc<AppContext>,
    tasks: JoinSet<()>,
    spawned: HashSet<Job>,
    jobs_tx: UnboundedSender<Vec<Job>>,
    jobs_rx: UnboundedReceiver<Vec<Job>>,
}

impl Scheduler {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        Scheduler {
            ctx,
            tasks: JoinSet::new(),
            spawned: HashSet::new(),
            jobs_tx,
            jobs_rx,
        }
    }

    /// 啟動畫面、紀錄檔、重新載入設定以及所有產品的排程
    pub fn start(&mut self) {
        let app = self.ctx.config.current();
        // 建立 AppContext 時已註冊的產品也要排程
        let mut jobs = self.ctx.register_all(&app);
        jobs.extend(
            self.ctx
                .aggregator
                .product_ids()
                .into_iter()
                .map(Job::Product),
        );
        self.spawn_jobs(jobs);

        let ctx = Arc::clone(&self.ctx);
        self.tasks.spawn(every(
            "display".to_string(),
            Duration::ZERO,
            {
                let ctx = Arc::clone(&ctx);
                move || Some(ctx.config.current().system.display_interval())
            },
            move || {
                let ctx = Arc::clone(&ctx);
                async move { ctx.display() }
            },
        ));

        let ctx = Arc::clone(&self.ctx);
        self.tasks.spawn(every(
            "record".to_string(),
            app.system.log_interval(),
            {
                let ctx = Arc::clone(&ctx);
                move || Some(ctx.config.current().system.log_interval())
            },
            move || {
                let ctx = Arc::clone(&ctx);
                async move { ctx.write_record() }
            },
        ));

        let ctx = Arc::clone(&self.ctx);
        let jobs_tx = self.jobs_tx.clone();
        self.tasks.spawn(every(
            "reload".to_string(),
            app.system.config_reload_interval(),
            {
                let ctx = Arc::clone(&ctx);
                move || Some(ctx.config.current().system.config_reload_interval())
            },
            move || {
                let ctx = Arc::clone(&ctx);
                let jobs_tx = jobs_tx.clone();
                async move {
                    let jobs = ctx.reload()?;
                    if !jobs.is_empty() {
                        jobs_tx.send(jobs)?;
                    }
                    Ok(())
                }
            },
        ));

        logging::info_file_async(format!(
            "排程已啟動，共 {} 個產品",
            self.ctx.aggregator.product_ids().len()
        ));
    }

    /// 登入檢查先排，同一個工作只會排一次
    pub fn spawn_jobs(&mut self, mut jobs: Vec<Job>) {
        jobs.sort_by_key(|job| matches!(job, Job::Product(_)));
        for job in jobs {
            self.spawn_job(job);
        }
    }

    fn spawn_job(&mut self, job: Job) {
        if !self.spawned.insert(job.clone()) {
            return;
        }

        let ctx = Arc::clone(&self.ctx);
        match job {
            Job::Product(id) => {
                let interval_id = id.clone();
                let interval_ctx = Arc::clone(&ctx);
                self.tasks.spawn(every(
                    format!("product {}", id),
                    Duration::ZERO,
                    move || interval_ctx.aggregator.poll_interval(&interval_id),
                    move || {
                        let ctx = Arc::clone(&ctx);
                        let id = id.clone();
                        async move { ctx.tick(&id).await }
                    },
                ));
            }
            Job::Probe(name) => {
                let interval_name = name.clone();
                let interval_ctx = Arc::clone(&ctx);
                self.tasks.spawn(every(
                    format!("probe {}", name),
                    Duration::ZERO,
                    // 設定移除檢查後仍保留排程，等下一次重新載入
                    move || {
                        let app = interval_ctx.config.current();
                        Some(
                            app.source(&interval_name)
                                .and_then(|s| s.probe_interval())
                                .unwrap_or_else(|| app.system.config_reload_interval()),
                        )
                    },
                    move || {
                        let ctx = Arc::clone(&ctx);
                        let name = name.clone();
                        async move { ctx.probe(&name).await }
                    },
                ));
            }
        }
    }

    #[cfg(test)]
    fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// 執行到 `shutdown` 完成為止，之後中止所有排程
    pub async fn run_until<F: Future<Output = ()>>(mut self, shutdown: F) {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(jobs) = self.jobs_rx.recv() => self.spawn_jobs(jobs),
                Some(joined) = self.tasks.join_next() => {
                    if let Err(why) = joined {
                        logging::error_file_async(format!("A scheduled task stopped because {:?}", why));
                    }
                }
            }
        }

        self.tasks.shutdown().await;
    }
}

/// 依間隔反覆執行 `task`，每一輪執行完才重新取得間隔
///
/// `interval` 回傳 `None` 時結束。
async fn every<I, F, Fut>(name: String, first_delay: Duration, interval: I, task: F)
where
    I: Fn() -> Option<Duration>,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if !first_delay.is_zero() {
        time::sleep(first_delay).await;
    }

    loop {
        if let Err(why) = task().await {
            logging::error_file_async(format!(
                "Failed to execute task({}) because {:?}",
                name, why
            ));
        }

        match interval() {
            Some(duration) => time::sleep(duration).await,
            None => break,
        }
    }
}
