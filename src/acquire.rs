//! 延迟绑定依赖的有限重试获取
//!
//! 传输后端这类依赖可能在启动后一段时间才可用。这里按固定间隔探测，
//! 超过次数预算就放弃并显式进入失败态，不做无限等待。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::sleep;

/// 获取失败
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AcquireError {
    #[error("Dependency not ready after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// 获取阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquirePhase {
    /// 探测中
    Probing,
    /// 已就绪
    Ready,
    /// 已放弃
    Failed,
}

/// 获取配置
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    /// 最大探测次数
    pub max_attempts: u32,
    /// 探测间隔
    pub interval: Duration,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            interval: Duration::from_secs(5),
        }
    }
}

/// 按固定间隔探测，直到拿到依赖或用完次数预算
pub async fn acquire<T, F, Fut>(config: AcquireConfig, mut probe: F) -> Result<T, AcquireError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=config.max_attempts {
        if let Some(value) = probe().await {
            tracing::info!(attempt, "dependency ready");
            return Ok(value);
        }

        tracing::debug!(attempt, max_attempts = config.max_attempts, "dependency not ready yet");

        // 最后一次尝试之后不再等待
        if attempt < config.max_attempts {
            sleep(config.interval).await;
        }
    }

    tracing::warn!(attempts = config.max_attempts, "dependency unavailable, giving up");

    Err(AcquireError::Exhausted {
        attempts: config.max_attempts,
    })
}

enum DependencyState<T> {
    Probing,
    Ready(T),
    Failed,
}

/// 延迟绑定的依赖句柄
///
/// 就绪前的读取会得到 `None`，调用方据此决定如何失败，不会排队等待
pub struct Dependency<T> {
    inner: Arc<RwLock<DependencyState<T>>>,
}

impl<T> Clone for Dependency<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Dependency<T> {
    /// 已经就绪的依赖（测试和同进程装配用）
    pub fn ready(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DependencyState::Ready(value))),
        }
    }

    pub fn probing() -> Self {
        Self {
            inner: Arc::new(RwLock::new(DependencyState::Probing)),
        }
    }

    pub fn failed() -> Self {
        Self {
            inner: Arc::new(RwLock::new(DependencyState::Failed)),
        }
    }

    pub async fn phase(&self) -> AcquirePhase {
        match *self.inner.read().await {
            DependencyState::Probing => AcquirePhase::Probing,
            DependencyState::Ready(_) => AcquirePhase::Ready,
            DependencyState::Failed => AcquirePhase::Failed,
        }
    }

    async fn set_ready(&self, value: T) {
        *self.inner.write().await = DependencyState::Ready(value);
    }

    async fn set_failed(&self) {
        *self.inner.write().await = DependencyState::Failed;
    }
}

impl<T: Clone> Dependency<T> {
    /// 就绪时返回依赖的克隆，否则 `None`
    pub async fn get(&self) -> Option<T> {
        match &*self.inner.read().await {
            DependencyState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }
}

impl<T: Send + Sync + 'static> Dependency<T> {
    /// 在后台开始探测，句柄立刻可用（初始为探测中）
    pub fn acquire_with<F, Fut>(config: AcquireConfig, probe: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<T>> + Send,
    {
        let dependency = Self::probing();
        let handle = dependency.clone();

        tokio::spawn(async move {
            match acquire(config, probe).await {
                Ok(value) => handle.set_ready(value).await,
                Err(_) => handle.set_failed().await,
            }
        });

        dependency
    }
}
