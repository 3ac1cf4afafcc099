//! 身份轮换服务 - 业务能力层
//!
//! 每次请求前：先换 Tor 线路，再生成随机 User-Agent

use crate::error::FetchError;
use crate::infrastructure::{CircuitControl, DocumentSource};
use crate::services::page_fetcher::PageFetcher;
use rand::Rng;
use std::ops::RangeInclusive;
use tracing::debug;

/// 单次请求使用的客户端标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    /// 生成长度在 `len` 范围内的随机小写字母串
    pub fn generate<R: Rng>(rng: &mut R, len: RangeInclusive<usize>) -> Self {
        let n = rng.random_range(len);
        let agent = (0..n).map(|_| char::from(b'a' + rng.random_range(0..26u8))).collect();
        Self(agent)
    }

    pub fn user_agent(&self) -> &str {
        &self.0
    }
}

/// 带身份轮换的会话
///
/// 职责：
/// - 首次请求时启动匿名网络
/// - 每次请求前换线路，失败则不发请求
/// - 每次请求使用新的 User-Agent
pub struct IdentityRotatingSession<S, N, R> {
    source: S,
    network: N,
    rng: R,
    identity_len: RangeInclusive<usize>,
    started: bool,
}

impl<S, N, R> IdentityRotatingSession<S, N, R>
where
    S: DocumentSource,
    N: CircuitControl,
    R: Rng,
{
    pub fn new(source: S, network: N, rng: R, identity_len: RangeInclusive<usize>) -> Self {
        Self {
            source,
            network,
            rng,
            identity_len,
            started: false,
        }
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    async fn rotate(&mut self) -> Result<SessionIdentity, FetchError> {
        if !self.started {
            self.network
                .start()
                .await
                .map_err(|source| FetchError::IdentityRotation { source })?;
            self.started = true;
        }

        self.network
            .new_identity()
            .await
            .map_err(|source| FetchError::IdentityRotation { source })?;

        Ok(SessionIdentity::generate(&mut self.rng, self.identity_len.clone()))
    }
}

impl<S, N, R> PageFetcher for IdentityRotatingSession<S, N, R>
where
    S: DocumentSource,
    N: CircuitControl,
    R: Rng,
{
    async fn fetch(&mut self, page_id: u64) -> Result<String, FetchError> {
        let identity = self.rotate().await?;
        debug!("页面 {} 使用新身份: {}", page_id, identity.user_agent());
        self.source.get(page_id, Some(identity.user_agent())).await
    }

    async fn shutdown(&mut self) {
        if self.started {
            self.network.stop().await;
            self.started = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TorError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeNetwork {
        starts: usize,
        rotations: usize,
        stops: usize,
        fail_rotation: bool,
    }

    impl CircuitControl for FakeNetwork {
        async fn start(&mut self) -> Result<(), TorError> {
            self.starts += 1;
            Ok(())
        }

        async fn new_identity(&mut self) -> Result<(), TorError> {
            if self.fail_rotation {
                return Err(TorError::ControlRejected {
                    command: "SIGNAL NEWNYM".into(),
                    reply: "551 busy".into(),
                });
            }
            self.rotations += 1;
            Ok(())
        }

        async fn stop(&mut self) {
            self.stops += 1;
        }
    }

    /// 记录每次请求的 User-Agent
    #[derive(Default)]
    struct RecordingSource {
        agents: RefCell<Vec<Option<String>>>,
    }

    impl DocumentSource for RecordingSource {
        async fn get(&self, page_id: u64, user_agent: Option<&str>) -> Result<String, FetchError> {
            self.agents.borrow_mut().push(user_agent.map(str::to_string));
            Ok(format!("<p>{}</p>", page_id))
        }
    }

    #[test]
    fn test_identity_is_lowercase_within_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let identity = SessionIdentity::generate(&mut rng, 1..=20);
            let len = identity.user_agent().len();
            assert!((1..=20).contains(&len));
            assert!(identity.user_agent().chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_identity_deterministic_with_seed() {
        let a = SessionIdentity::generate(&mut StdRng::seed_from_u64(42), 1..=20);
        let b = SessionIdentity::generate(&mut StdRng::seed_from_u64(42), 1..=20);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_rotates_before_every_fetch() {
        let mut session = IdentityRotatingSession::new(
            RecordingSource::default(),
            FakeNetwork::default(),
            StdRng::seed_from_u64(1),
            5..=5,
        );

        assert_eq!(session.fetch(1).await.unwrap(), "<p>1</p>");
        session.fetch(2).await.unwrap();

        assert_eq!(session.network().starts, 1);
        assert_eq!(session.network().rotations, 2);
        let agents = session.source.agents.borrow();
        assert_eq!(agents.len(), 2);
        assert!(agents.iter().all(|a| a.as_ref().map(String::len) == Some(5)));
        drop(agents);

        session.shutdown().await;
        session.shutdown().await;
        assert_eq!(session.network().stops, 1);
    }

    #[tokio::test]
    async fn test_rotation_failure_blocks_request() {
        let network = FakeNetwork {
            fail_rotation: true,
            ..FakeNetwork::default()
        };
        let mut session = IdentityRotatingSession::new(
            RecordingSource::default(),
            network,
            StdRng::seed_from_u64(1),
            1..=20,
        );

        let err = session.fetch(1).await.unwrap_err();
        assert!(matches!(err, FetchError::IdentityRotation { .. }));
        assert!(session.source.agents.borrow().is_empty());
    }
}
