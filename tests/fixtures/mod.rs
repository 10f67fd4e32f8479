#![allow(dead_code)]

use async_trait::async_trait;
use gunadarma_assistant::ai::{AskRequest, AskResponse, ChatApiError, ChatResult, QuestionBackend};
use gunadarma_assistant::session::SessionSnapshot;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

const WAIT_LIMIT: Duration = Duration::from_secs(2);

/// Backend whose answers are released by the test, one question at a time.
#[derive(Default)]
pub struct GatedBackend {
    waiting: Mutex<HashMap<String, oneshot::Sender<ChatResult<AskResponse>>>>,
    asked: Mutex<Vec<AskRequest>>,
}

impl GatedBackend {
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.question.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<AskRequest> {
        self.asked.lock().unwrap().clone()
    }

    pub fn pending(&self) -> usize {
        self.waiting.lock().unwrap().len()
    }

    pub async fn wait_for_question(&self, question: &str) {
        tokio::time::timeout(WAIT_LIMIT, async {
            while !self.waiting.lock().unwrap().contains_key(question) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("question {question:?} was never asked"));
    }

    /// Resolve the pending question. Returns false if nobody is waiting for it any more.
    pub fn release(&self, question: &str, result: ChatResult<AskResponse>) -> bool {
        let sender = self.waiting.lock().unwrap().remove(question);
        sender.is_some_and(|tx| tx.send(result).is_ok())
    }

    pub fn answer(&self, question: &str, answer: &str) -> bool {
        self.release(question, Ok(response(answer)))
    }
}

#[async_trait]
impl QuestionBackend for GatedBackend {
    async fn ask(
        &self,
        request: AskRequest,
        _cancel: &CancellationToken,
    ) -> ChatResult<AskResponse> {
        let (tx, rx) = oneshot::channel();
        self.waiting
            .lock()
            .unwrap()
            .insert(request.question.clone(), tx);
        self.asked.lock().unwrap().push(request);
        rx.await
            .unwrap_or_else(|_| Err(ChatApiError::transport(std::io::Error::other("gate closed"))))
    }
}

pub fn response(answer: &str) -> AskResponse {
    AskResponse {
        answer: answer.to_string(),
        source_urls: vec!["https://www.gunadarma.ac.id".to_string()],
        metadata: None,
    }
}

pub async fn wait_until(
    rx: &mut watch::Receiver<SessionSnapshot>,
    condition: impl FnMut(&SessionSnapshot) -> bool,
) {
    tokio::time::timeout(WAIT_LIMIT, rx.wait_for(condition))
        .await
        .expect("session never reached the expected state")
        .map(|_| ())
        .expect("session dropped");
}

/// Give spawned tasks a chance to run without expecting any visible change.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}
