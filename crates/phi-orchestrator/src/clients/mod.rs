//! Clients for the services a workflow talks to.

pub mod analyzer;
pub mod core_api;
pub mod notify;

pub use analyzer::{Analysis, AnalysisRequest, Analyzer, AnalyzerError, DigestAnalyzer, OpenAiAnalyzer};
pub use core_api::{AgentProfile, CoreApi, CoreApiClient, CoreApiError, DocChunk};
pub use notify::{
    LogNotifier, Notification, Notifier, NotifyError, SlackWebhookNotifier, SmtpConfig, SmtpNotifier,
};
