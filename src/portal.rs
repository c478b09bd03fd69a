use std::sync::Arc;

use crate::completions::CompletionClient;
use crate::error::{PortalError, PortalResult};
use crate::files::FileStorage;
use crate::models::{AccountId, StudentProfile};
use crate::store::PortalStore;
use crate::tasks::TaskQueue;

/// Account resolved by the authentication layer, if any.
pub type Caller = Option<AccountId>;

/// Entry point for every portal operation. Collaborators are injected so
/// the same operations run against Postgres or the in-memory store.
#[derive(Clone)]
pub struct Portal {
    pub store: Arc<dyn PortalStore>,
    pub files: Arc<dyn FileStorage>,
    pub tasks: Arc<dyn TaskQueue>,
    pub completions: Arc<dyn CompletionClient>,
}

impl Portal {
    pub fn new(
        store: Arc<dyn PortalStore>,
        files: Arc<dyn FileStorage>,
        tasks: Arc<dyn TaskQueue>,
        completions: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            store,
            files,
            tasks,
            completions,
        }
    }

    pub(crate) async fn student_for(&self, caller: Caller) -> PortalResult<Option<StudentProfile>> {
        match caller {
            Some(account) => self.store.student_by_account(account).await,
            None => Ok(None),
        }
    }

    pub(crate) async fn require_student(&self, caller: Caller) -> PortalResult<StudentProfile> {
        let account = require_account(caller)?;
        self.store
            .student_by_account(account)
            .await?
            .ok_or(PortalError::NotFound("student profile"))
    }
}

pub fn require_account(caller: Caller) -> PortalResult<AccountId> {
    caller.ok_or(PortalError::NotAuthenticated)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::completions::CompletionError;
    use crate::files::LocalFileStorage;
    use crate::models::{ChatMessage, ProfileInput};
    use crate::store::MemoryStore;
    use crate::tasks::TokioTaskQueue;

    /// Replays canned replies in order and records what it was sent.
    #[derive(Default)]
    pub struct ScriptedCompletions {
        replies: Mutex<VecDeque<Result<String, CompletionError>>>,
        pub seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedCompletions {
        pub fn replying(replies: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletions {
        async fn complete(
            &self,
            _system_prompt: &str,
            history: &[ChatMessage],
        ) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(history.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CompletionError::Empty))
        }
    }

    pub struct Harness {
        pub portal: Portal,
        pub tasks: Arc<TokioTaskQueue>,
        pub completions: Arc<ScriptedCompletions>,
    }

    pub fn harness(completions: ScriptedCompletions) -> Harness {
        let tasks = Arc::new(TokioTaskQueue::new());
        let completions = Arc::new(completions);
        let files = LocalFileStorage::new(
            std::env::temp_dir().join(format!("portal-test-{}", Uuid::new_v4())),
        );
        let portal = Portal::new(
            Arc::new(MemoryStore::new()),
            Arc::new(files),
            tasks.clone(),
            completions.clone(),
        );
        Harness {
            portal,
            tasks,
            completions,
        }
    }

    pub fn profile(branch: &str, term: i32) -> ProfileInput {
        ProfileInput {
            registration_id: "1RV21CS042".to_string(),
            display_name: "Ananya Rao".to_string(),
            branch: branch.to_string(),
            current_term: term,
            cohort_label: "2021-2025".to_string(),
        }
    }
}
