//! Secure transport wrapper
//!
//! Intercepts every inbound message, classifies it, and runs requests and
//! notifications through the pipeline. Blocked requests get a sanitized
//! error response with the original id; blocked notifications are dropped
//! silently; responses are host output and pass through untouched. The
//! value forwarded to the protocol is always the original, never the
//! normalized copy.
//!
//! Processing is strictly sequential per wrapper, so error responses leave
//! in the same order as the requests that caused them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::pipeline::context::{SideEffectPolicy, ValidationContext};
use crate::pipeline::result::Verdict;
use crate::pipeline::Pipeline;
use crate::protocol::jsonrpc::{classify, normalize, MessageKind, RequestId};
use crate::sanitize::ErrorSanitizer;

use super::Transport;

/// What became of one inbound message.
#[derive(Debug)]
pub enum InboundDecision {
    /// Validated (or exempt); hand the original value to the protocol
    Forward(Value),
    /// Blocked notification; nothing was sent back
    Dropped(Verdict),
    /// Blocked request; a sanitized error response was sent
    Rejected(Verdict),
}

pub struct SecureTransport {
    inner: Box<dyn Transport>,
    pipeline: Arc<Pipeline>,
    sanitizer: Arc<ErrorSanitizer>,
    policy: SideEffectPolicy,
    base_dir: Option<PathBuf>,
}

impl SecureTransport {
    pub fn new(
        inner: Box<dyn Transport>,
        pipeline: Arc<Pipeline>,
        sanitizer: Arc<ErrorSanitizer>,
    ) -> Self {
        Self {
            inner,
            pipeline,
            sanitizer,
            policy: SideEffectPolicy::default(),
            base_dir: None,
        }
    }

    pub fn with_policy(mut self, policy: SideEffectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub async fn start(&mut self) -> Result<()> {
        self.inner.start().await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }

    /// Outbound passthrough for the host protocol.
    pub async fn send(&mut self, message: Value) -> Result<()> {
        self.inner.send(message).await
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.session_id()
    }

    /// Receive and process the next inbound message. `None` means the peer
    /// disconnected.
    pub async fn next(&mut self) -> Result<Option<InboundDecision>> {
        match self.inner.receive().await? {
            Some(raw) => Ok(Some(self.intercept(raw).await?)),
            None => Ok(None),
        }
    }

    /// Classify and validate one inbound value.
    pub async fn intercept(&mut self, raw: Value) -> Result<InboundDecision> {
        match classify(&raw) {
            MessageKind::Response => Ok(InboundDecision::Forward(raw)),
            MessageKind::Request => self.intercept_request(raw).await,
            MessageKind::Notification => self.intercept_notification(raw),
            MessageKind::Invalid => self.intercept_request(raw).await,
        }
    }

    async fn intercept_request(&mut self, raw: Value) -> Result<InboundDecision> {
        let verdict = self.run_pipeline(&raw);
        if verdict.passed {
            return Ok(InboundDecision::Forward(raw));
        }
        let id = RequestId::from_message(&raw);
        let response = self.sanitizer.create_error_response(id.as_ref(), &verdict);
        self.inner.send(response).await?;
        Ok(InboundDecision::Rejected(verdict))
    }

    fn intercept_notification(&mut self, raw: Value) -> Result<InboundDecision> {
        let verdict = self.run_pipeline(&raw);
        if verdict.passed {
            Ok(InboundDecision::Forward(raw))
        } else {
            Ok(InboundDecision::Dropped(verdict))
        }
    }

    fn run_pipeline(&self, raw: &Value) -> Verdict {
        let normalized = normalize(raw);
        let mut ctx = ValidationContext::now().with_policy(self.policy);
        ctx.session_id = self.inner.session_id();
        ctx.base_dir = self.base_dir.clone();
        ctx.transport_level = true;
        self.pipeline.validate(&normalized, &mut ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::ValidationLayer;
    use crate::pipeline::result::{LayerResult, Severity, ViolationType};
    use crate::sanitize::SanitizerMode;
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    /// Blocks any message whose method is "blocked/method".
    struct MethodBlocker;
    impl ValidationLayer for MethodBlocker {
        fn name(&self) -> &str {
            "method-blocker"
        }
        fn validate(&self, message: &Value, _ctx: &mut ValidationContext) -> LayerResult {
            if message.get("method").and_then(Value::as_str) == Some("blocked/method") {
                LayerResult::block(
                    Severity::High,
                    ViolationType::SuspiciousMethod,
                    "blocked for test",
                )
            } else if message.get("method").is_none() {
                LayerResult::block(
                    Severity::Critical,
                    ViolationType::MalformedMessage,
                    "no method",
                )
            } else {
                LayerResult::Pass
            }
        }
    }

    fn wrapper(inbound: Vec<Value>) -> (SecureTransport, Arc<std::sync::Mutex<Vec<Value>>>) {
        let transport = MockTransport::new(inbound);
        let sent = transport.sent_handle();
        let secure = SecureTransport::new(
            Box::new(transport),
            Arc::new(Pipeline::new(vec![Arc::new(MethodBlocker)])),
            Arc::new(ErrorSanitizer::new(SanitizerMode::Development)),
        );
        (secure, sent)
    }

    #[tokio::test]
    async fn benign_request_forwarded_verbatim() {
        let original = json!({"jsonrpc": "2.0", "method": "tools/call", "id": 1,
                              "params": {"name": "debug-echo"}, "_meta": {"x": 1}});
        let (mut secure, sent) = wrapper(vec![original.clone()]);
        secure.start().await.unwrap();

        match secure.next().await.unwrap().unwrap() {
            InboundDecision::Forward(v) => assert_eq!(v, original),
            other => panic!("expected forward, got {:?}", other),
        }
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blocked_request_gets_error_with_same_id() {
        let (mut secure, sent) = wrapper(vec![
            json!({"jsonrpc": "2.0", "method": "blocked/method", "id": 42}),
        ]);
        match secure.next().await.unwrap().unwrap() {
            InboundDecision::Rejected(verdict) => {
                assert_eq!(verdict.violation, ViolationType::SuspiciousMethod)
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["id"], 42);
        assert_eq!(sent[0]["jsonrpc"], "2.0");
        assert!(sent[0]["error"]["code"].is_i64());
        assert_eq!(sent[0]["error"]["data"]["token"].as_str().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn blocked_notification_dropped_silently() {
        let (mut secure, sent) = wrapper(vec![
            json!({"jsonrpc": "2.0", "method": "blocked/method"}),
        ]);
        match secure.next().await.unwrap().unwrap() {
            InboundDecision::Dropped(_) => {}
            other => panic!("expected drop, got {:?}", other),
        }
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn responses_pass_through_unvalidated() {
        // Even a response mentioning the blocked method is host output
        let response = json!({"jsonrpc": "2.0", "id": 9,
                              "result": {"echo": "blocked/method"}});
        let (mut secure, sent) = wrapper(vec![response.clone()]);
        match secure.next().await.unwrap().unwrap() {
            InboundDecision::Forward(v) => assert_eq!(v, response),
            other => panic!("expected forward, got {:?}", other),
        }
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_shape_rejected_with_null_id() {
        let (mut secure, sent) = wrapper(vec![json!({"junk": true})]);
        match secure.next().await.unwrap().unwrap() {
            InboundDecision::Rejected(_) => {}
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(sent.lock().unwrap()[0]["id"], Value::Null);
    }

    #[tokio::test]
    async fn error_responses_keep_request_order() {
        let (mut secure, sent) = wrapper(vec![
            json!({"jsonrpc": "2.0", "method": "blocked/method", "id": 1}),
            json!({"jsonrpc": "2.0", "method": "blocked/method", "id": 2}),
            json!({"jsonrpc": "2.0", "method": "blocked/method", "id": 3}),
        ]);
        while secure.next().await.unwrap().is_some() {}
        let sent = sent.lock().unwrap();
        let ids: Vec<i64> = sent.iter().map(|v| v["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn disconnect_yields_none() {
        let (mut secure, _) = wrapper(vec![]);
        assert!(secure.next().await.unwrap().is_none());
    }
}
