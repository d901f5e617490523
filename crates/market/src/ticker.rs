use crate::analyzer::MarketAnalyzer;
use koyomi_core::analysis::entity::TodayState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// # Summary
/// "今日行情"定时轮询任务。
///
/// # Invariants
/// - 同一时刻最多只有一个抓取在途，上一次未完成时本次 tick 直接跳过。
/// - 最新状态通过 watch 通道发布，读取方永远只看到最后一次结果。
pub struct TickerPoller {
    analyzer: Arc<MarketAnalyzer>,
    period: Duration,
}

/// 轮询任务的控制句柄
pub struct PollerHandle {
    state: watch::Receiver<TodayState>,
    skipped: Arc<AtomicU64>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// 在途标记的 RAII 守卫，抓取结束（含 panic 展开）时自动释放
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TickerPoller {
    pub fn new(analyzer: Arc<MarketAnalyzer>, period: Duration) -> Self {
        Self { analyzer, period }
    }

    /// # Summary
    /// 启动后台轮询。
    ///
    /// # Logic
    /// 1. 立即触发第一次抓取，之后按固定周期触发（错过的 tick 跳过，不补发）。
    /// 2. 每次 tick 先尝试获取在途标记，获取失败计入跳过次数。
    /// 3. 抓取在独立任务中执行，结果写入 watch 通道：成功为 `Ready`，失败为 `Unavailable`。
    /// 4. 收到停止信号后退出循环。
    ///
    /// # Returns
    /// 控制句柄。
    pub fn spawn(self) -> PollerHandle {
        let (state_tx, state_rx) = watch::channel(TodayState::Loading);
        let state_tx = Arc::new(state_tx);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let in_flight = Arc::new(AtomicBool::new(false));
        let skipped = Arc::new(AtomicU64::new(0));

        let period = self.period.max(Duration::from_millis(1));
        let analyzer = self.analyzer;
        let skipped_counter = skipped.clone();

        let task = tokio::spawn(async move {
            info!("ticker poller started, period {:?}", period);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let Some(guard) = InFlight::acquire(&in_flight) else {
                            let total = skipped_counter.fetch_add(1, Ordering::Relaxed) + 1;
                            debug!("previous ticker fetch still pending, skipping tick ({} skipped)", total);
                            continue;
                        };

                        let analyzer = analyzer.clone();
                        let state_tx = state_tx.clone();
                        tokio::spawn(async move {
                            let _guard = guard;
                            let next = match analyzer.today().await {
                                Ok(snapshot) => TodayState::Ready(snapshot),
                                Err(e) => {
                                    warn!("failed to refresh today's ticker: {}", e);
                                    TodayState::Unavailable {
                                        reason: e.to_string(),
                                        at: analyzer.now(),
                                    }
                                }
                            };
                            state_tx.send_replace(next);
                        });
                    }
                }
            }
            info!("ticker poller stopped");
        });

        PollerHandle {
            state: state_rx,
            skipped,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

impl PollerHandle {
    pub fn subscribe(&self) -> watch::Receiver<TodayState> {
        self.state.clone()
    }

    pub fn latest(&self) -> TodayState {
        self.state.borrow().clone()
    }

    /// 因上一次抓取未完成而跳过的 tick 数
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// 停止轮询并等待循环退出（在途抓取不会被中断）
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take()
            && tx.send(()).is_err()
        {
            debug!("ticker poller already stopped");
        }
        if let Err(e) = (&mut self.task).await {
            warn!("ticker poller task ended abnormally: {}", e);
        }
    }
}
