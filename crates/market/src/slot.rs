use crate::analyzer::MarketAnalyzer;
use koyomi_core::analysis::entity::{Scope, ScopeOutcome};
use koyomi_core::market::error::MarketError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// 单调递增的请求代号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// # Summary
/// 最终展示槽：只接受最新一次请求的结果。
///
/// # Invariants
/// - 每次 `begin` 都会使之前所有代号失效。
/// - 旧代号的 `publish` 被丢弃，不会覆盖更新的结果。
pub struct DisplaySlot<T> {
    latest: AtomicU64,
    tx: watch::Sender<Option<T>>,
}

impl<T> Default for DisplaySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DisplaySlot<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            latest: AtomicU64::new(0),
            tx,
        }
    }

    /// 开始一次新请求，返回其代号
    pub fn begin(&self) -> Generation {
        Generation(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// 代号是否仍是最新
    pub fn is_current(&self, generation: Generation) -> bool {
        self.latest.load(Ordering::SeqCst) == generation.0
    }

    /// # Summary
    /// 发布结果。
    ///
    /// # Logic
    /// 在 watch 通道的写锁内确认代号，与其他 `publish` / `close` 串行。
    /// `begin` 不持有该锁：若新请求恰在确认之后开始，本次结果仍会写入，
    /// 随后由新请求的 `publish` 覆盖（最后写入者胜出）。
    ///
    /// # Returns
    /// 结果被采纳返回 true，已过期返回 false。
    pub fn publish(&self, generation: Generation, value: T) -> bool {
        let mut value = Some(value);
        let accepted = self.tx.send_if_modified(|slot| {
            if self.is_current(generation) {
                *slot = value.take();
                true
            } else {
                false
            }
        });
        if !accepted {
            debug!("discarding stale result of generation {}", generation.0);
        }
        accepted
    }

    /// 清空展示内容（关闭弹窗），同时使在途请求失效
    pub fn close(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
        self.tx.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }
}

impl<T: Clone> DisplaySlot<T> {
    pub fn current(&self) -> Option<T> {
        self.tx.borrow().clone()
    }
}

/// # Summary
/// 一个展示槽上的范围分析会话：快速切换范围时，最后一次选择总是胜出。
pub struct ScopeSession {
    analyzer: Arc<MarketAnalyzer>,
    slot: DisplaySlot<ScopeOutcome>,
}

impl ScopeSession {
    pub fn new(analyzer: Arc<MarketAnalyzer>) -> Self {
        Self {
            analyzer,
            slot: DisplaySlot::new(),
        }
    }

    /// # Summary
    /// 选择一个范围并在完成后尝试发布结果。
    ///
    /// # Logic
    /// 1. 先领取代号，再执行分析。
    /// 2. 若期间已有更新的选择，结果被丢弃。
    ///
    /// # Returns
    /// 结果是否被展示；输入非法时返回 Err。
    pub async fn select(&self, scope: Scope) -> Result<bool, MarketError> {
        let generation = self.slot.begin();
        let outcome = self.analyzer.analyze(scope).await?;
        Ok(self.slot.publish(generation, outcome))
    }

    pub fn slot(&self) -> &DisplaySlot<ScopeOutcome> {
        &self.slot
    }

    pub fn close(&self) {
        self.slot.close();
    }
}
