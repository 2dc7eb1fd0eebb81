//! Independent runtimes keyed by session id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::Runtime;
use crate::error::{RuntimeError, RuntimeResult};

/// Session table. Cloning shares the table.
///
/// Each runtime sits behind its own mutex: runs in one session are
/// serialized, different sessions never wait on each other.
#[derive(Clone, Default)]
pub struct Sessions {
    inner: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Runtime>>>>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty session and return its id.
    pub async fn create(&self) -> Uuid {
        let runtime = Runtime::new();
        let id = runtime.id();
        self.inner
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(runtime)));
        id
    }

    pub async fn get(&self, id: Uuid) -> RuntimeResult<Arc<Mutex<Runtime>>> {
        self.inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RuntimeError::SessionNotFound(id.to_string()))
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    pub async fn ids(&self) -> Vec<Uuid> {
        self.inner.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::worker::tests::EchoWorker;
    use crate::runtime::{Artifact, PlatformData, UserInfoData};

    #[tokio::test]
    async fn test_create_get_remove() {
        let sessions = Sessions::new();
        let id = sessions.create().await;
        assert_eq!(sessions.get(id).await.unwrap().lock().await.id(), id);
        assert!(sessions.remove(id).await);
        assert!(matches!(
            sessions.get(id).await,
            Err(RuntimeError::SessionNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sessions_are_independent() {
        let sessions = Sessions::new();
        let mut handles = Vec::new();
        for i in 0..4 {
            let sessions = sessions.clone();
            handles.push(tokio::spawn(async move {
                let id = sessions.create().await;
                let runtime = sessions.get(id).await.unwrap();
                let mut runtime = runtime.lock().await;
                runtime.set(Artifact::new(UserInfoData {
                    user_comment: format!("platform-{}", i),
                }));
                runtime.run(&EchoWorker::new()).await.unwrap();
                (id, i)
            }));
        }
        for handle in handles {
            let (id, i) = handle.await.unwrap();
            let runtime = sessions.get(id).await.unwrap();
            let runtime = runtime.lock().await;
            let platform: &PlatformData = runtime.get("platform_data").unwrap();
            assert_eq!(platform.platform_name, format!("platform-{}", i));
        }
        assert_eq!(sessions.ids().await.len(), 4);
    }
}
