//! # `koyomi-core` - 领域模型与端口定义
//!
//! 本 crate 只包含纯数据实体、错误枚举与异步端口 (Port) 契约，
//! 不依赖任何具体的网络或运行时实现。
//!
//! ## 模块划分
//! - `common`: 标的身份、K 线周期、周起始日与时钟抽象
//! - `market`: K 线实体、时间窗口、行情错误与 `CandleFetcher` 端口
//! - `analysis`: 周期统计、技术指标快照、范围选择器与结果状态
//! - `config`: 全局应用配置

pub mod analysis;
pub mod common;
pub mod config;
pub mod market;
