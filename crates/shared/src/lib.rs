//! 共享库
//!
//! 包含分组与徽章服务共用的配置加载、日志和指标等基础设施代码。

pub mod config;
pub mod observability;
