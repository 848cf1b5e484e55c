//! Secure MCP server wiring
//!
//! [`SecureMcpServer`] owns the whole instance tree - catalog, layers,
//! pipeline, quota provider, session memory, sanitizer - with no
//! process-wide mutable state. Hosts construct it with a validated options
//! envelope, connect a transport, and pump validated messages out of it.

mod report;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::catalog::Catalog;
use crate::errors::WardenError;
use crate::layers::{
    BehaviorConfig, BehaviorLayer, ContentConfig, ContentLayer, ContextualLayer, SemanticLayer,
    StructureConfig, StructureLayer, ValidationLayer,
};
use crate::logging::{DecisionSink, TracingSink};
use crate::pipeline::context::SideEffectPolicy;
use crate::pipeline::Pipeline;
use crate::policy::{
    ChainingPolicy, ChainingRule, MemoryQuotaProvider, QuotaLimits, QuotaProvider, ResourcePolicy,
    SessionMemory, ToolRegistry,
};
use crate::protocol::mcp::MethodTable;
use crate::sanitize::{ErrorSanitizer, SanitizerMode};
use crate::transport::{InboundDecision, SecureTransport, Transport};

pub use report::{ReportCollector, SecurityReport};

/// Identity advertised by the wrapped server.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Construction-time configuration envelope. Environment-variable handling
/// is a host concern; only structured values arrive here.
pub struct ServerOptions {
    pub max_message_size: usize,
    pub max_requests_per_minute: u32,
    pub max_requests_per_hour: u32,
    pub burst_threshold: usize,
    pub enable_logging: bool,
    pub verbose_logging: bool,
    pub log_performance_metrics: bool,
    pub log_level: tracing::Level,
    pub default_policy: SideEffectPolicy,
    pub tool_registry: ToolRegistry,
    pub resource_policy: ResourcePolicy,
    pub method_table: MethodTable,
    /// Chaining is opt-in; `None` leaves the check disabled
    pub chaining_rules: Option<Vec<ChainingRule>>,
    /// Method-level quota limits, keyed like `method:resources/read`
    pub quotas: HashMap<String, QuotaLimits>,
    /// Custom quota backend; defaults to the in-memory provider
    pub quota_provider: Option<Arc<dyn QuotaProvider>>,
    pub max_sessions: usize,
    pub session_ttl_ms: i64,
    pub clock_skew_ms: i64,
    pub sanitizer_mode: SanitizerMode,
    pub base_dir: Option<PathBuf>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_message_size: 50_000,
            max_requests_per_minute: 120,
            max_requests_per_hour: 2_000,
            burst_threshold: 10,
            enable_logging: true,
            verbose_logging: false,
            log_performance_metrics: false,
            log_level: tracing::Level::INFO,
            default_policy: SideEffectPolicy::default(),
            tool_registry: ToolRegistry::default(),
            resource_policy: ResourcePolicy::default(),
            method_table: MethodTable::standard(),
            chaining_rules: None,
            quotas: HashMap::new(),
            quota_provider: None,
            max_sessions: 5_000,
            session_ttl_ms: 3_600_000,
            clock_skew_ms: 5_000,
            sanitizer_mode: SanitizerMode::Production,
            base_dir: None,
        }
    }
}

impl ServerOptions {
    pub fn validate(&self) -> Result<(), WardenError> {
        if self.max_message_size < 10 {
            return Err(WardenError::config("max_message_size must be at least 10"));
        }
        if self.max_requests_per_minute == 0 || self.max_requests_per_hour == 0 {
            return Err(WardenError::config("request rate limits must be nonzero"));
        }
        if self.max_requests_per_minute > self.max_requests_per_hour {
            return Err(WardenError::config(
                "per-minute limit exceeds per-hour limit",
            ));
        }
        if self.burst_threshold == 0 {
            return Err(WardenError::config("burst_threshold must be nonzero"));
        }
        if self.max_sessions == 0 || self.session_ttl_ms <= 0 {
            return Err(WardenError::config("session limits must be positive"));
        }
        if self.clock_skew_ms < 0 {
            return Err(WardenError::config("clock_skew_ms must not be negative"));
        }
        Ok(())
    }
}

/// The assembled middleware: pipeline, collaborators, and the wrapped
/// transport.
pub struct SecureMcpServer {
    info: ServerInfo,
    pipeline: Arc<Pipeline>,
    contextual: Arc<ContextualLayer>,
    behavior: Arc<BehaviorLayer>,
    quota: Arc<dyn QuotaProvider>,
    sessions: Arc<SessionMemory>,
    sanitizer: Arc<ErrorSanitizer>,
    collector: Option<Arc<ReportCollector>>,
    policy: SideEffectPolicy,
    base_dir: Option<PathBuf>,
    transport: Option<SecureTransport>,
    sweeper: Option<JoinHandle<()>>,
}

impl SecureMcpServer {
    pub fn new(info: ServerInfo, options: ServerOptions) -> Result<Self, WardenError> {
        options.validate()?;

        let quota: Arc<dyn QuotaProvider> = options
            .quota_provider
            .clone()
            .unwrap_or_else(|| Arc::new(MemoryQuotaProvider::new(options.clock_skew_ms)));
        let sessions = Arc::new(SessionMemory::new(
            options.max_sessions,
            options.session_ttl_ms,
        ));
        let methods = Arc::new(options.method_table.clone());

        let structure = Arc::new(StructureLayer::new(
            StructureConfig {
                max_bytes: options.max_message_size,
                ..StructureConfig::default()
            },
            Arc::clone(&methods),
        ));
        let content = Arc::new(ContentLayer::new(
            Arc::new(Catalog::compile(crate::catalog::standard_rounds())?),
            ContentConfig::default(),
        ));
        let behavior = Arc::new(BehaviorLayer::new(BehaviorConfig {
            max_per_minute: options.max_requests_per_minute,
            max_per_hour: options.max_requests_per_hour,
            burst_threshold: options.burst_threshold,
            ..BehaviorConfig::default()
        }));
        let mut semantic = SemanticLayer::new(
            Arc::clone(&methods),
            Arc::new(options.tool_registry.clone()),
            Arc::new(options.resource_policy.clone()),
            Arc::clone(&quota),
            Arc::clone(&sessions),
        )
        .with_method_quotas(options.quotas.clone());
        if let Some(rules) = &options.chaining_rules {
            semantic = semantic.with_chaining(ChainingPolicy::new(rules.clone()));
        }
        let contextual = Arc::new(ContextualLayer::new());

        let layers: Vec<Arc<dyn ValidationLayer>> = vec![
            structure,
            content,
            Arc::clone(&behavior) as Arc<dyn ValidationLayer>,
            Arc::new(semantic),
            Arc::clone(&contextual) as Arc<dyn ValidationLayer>,
        ];

        let collector = if options.enable_logging {
            let inner: Arc<dyn DecisionSink> = Arc::new(TracingSink);
            Some(Arc::new(ReportCollector::new(
                Some(inner),
                options.verbose_logging,
            )))
        } else {
            None
        };

        let mut pipeline = Pipeline::new(layers);
        if let Some(collector) = &collector {
            pipeline = pipeline.with_sink(Arc::clone(collector) as Arc<dyn DecisionSink>);
        }

        tracing::info!(
            server = %info.name,
            version = %info.version,
            log_level = %options.log_level,
            performance_metrics = options.log_performance_metrics,
            "secure MCP server constructed"
        );

        Ok(Self {
            info,
            pipeline: Arc::new(pipeline),
            contextual,
            behavior,
            quota,
            sessions,
            sanitizer: Arc::new(ErrorSanitizer::new(options.sanitizer_mode)),
            collector,
            policy: options.default_policy,
            base_dir: options.base_dir,
            transport: None,
            sweeper: None,
        })
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Layer 5 extension surface: add validators, response validators, and
    /// global rules without subclassing anything.
    pub fn contextual(&self) -> &Arc<ContextualLayer> {
        &self.contextual
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Wrap a transport and begin receiving. Also starts the background
    /// sweep that keeps quota, session, and behavior state bounded.
    pub async fn connect(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        let mut secure = SecureTransport::new(
            transport,
            Arc::clone(&self.pipeline),
            Arc::clone(&self.sanitizer),
        )
        .with_policy(self.policy);
        if let Some(base_dir) = &self.base_dir {
            secure = secure.with_base_dir(base_dir.clone());
        }
        secure.start().await?;
        self.transport = Some(secure);

        let quota = Arc::clone(&self.quota);
        let sessions = Arc::clone(&self.sessions);
        let behavior = Arc::clone(&self.behavior);
        self.sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now_ms = Utc::now().timestamp_millis();
                quota.sweep(now_ms);
                sessions.cleanup(now_ms);
                behavior.cleanup(now_ms);
            }
        }));
        Ok(())
    }

    /// Next message that survived validation, ready for the protocol layer.
    /// Blocked requests and notifications are handled internally; `None`
    /// means the peer disconnected.
    pub async fn next_message(&mut self) -> Result<Option<Value>> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("not connected"))?;
        loop {
            match transport.next().await? {
                None => return Ok(None),
                Some(InboundDecision::Forward(message)) => return Ok(Some(message)),
                Some(InboundDecision::Rejected(_)) | Some(InboundDecision::Dropped(_)) => continue,
            }
        }
    }

    /// Send a host-produced message to the peer.
    pub async fn send(&mut self, message: Value) -> Result<()> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("not connected"))?;
        transport.send(message).await
    }

    /// Validate an outbound payload with the response validators before the
    /// host emits it.
    pub fn validate_response(
        &self,
        response: &Value,
        request: Option<&Value>,
    ) -> crate::pipeline::result::LayerResult {
        let ctx = crate::pipeline::ValidationContext::now();
        self.contextual.validate_response(response, request, &ctx)
    }

    /// Stop background work, destroy counters, close the transport, and
    /// return the final report when logging was enabled.
    pub async fn shutdown(&mut self) -> Result<Option<SecurityReport>> {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        self.behavior.cleanup(Utc::now().timestamp_millis());
        self.quota.destroy();
        if let Some(mut transport) = self.transport.take() {
            transport.close().await?;
        }
        let report = self.collector.as_ref().map(|c| c.report());
        if let Some(report) = &report {
            tracing::info!(
                total = report.total_messages,
                allowed = report.allowed,
                blocked = report.blocked,
                "secure MCP server shut down"
            );
        }
        Ok(report)
    }
}
