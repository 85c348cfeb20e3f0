use crate::{AdminError, AdminResult};
use folio_sdk::ResourceKind;
use opentelemetry::trace::Status;
use std::future::Future;
use tracing::{info_span, Span};
use tracing_futures::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSpanMethod {
    Create,
    Delete,
    RefreshAll,
    RefreshOne,
    LoadList,
    LoadDetail,
    MarkRead,
    DeleteMessage,
}

impl AdminSpanMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::RefreshAll => "refresh_all",
            Self::RefreshOne => "refresh_one",
            Self::LoadList => "load_list",
            Self::LoadDetail => "load_detail",
            Self::MarkRead => "mark_read",
            Self::DeleteMessage => "delete_message",
        }
    }
}

pub struct AdminSpan {
    span: Span,
}

impl AdminSpan {
    #[must_use]
    pub fn new(method: AdminSpanMethod, kind: Option<ResourceKind>) -> Self {
        let span = match method {
            AdminSpanMethod::Create => info_span!("folio_admin.create"),
            AdminSpanMethod::Delete => info_span!("folio_admin.delete"),
            AdminSpanMethod::RefreshAll => info_span!("folio_admin.refresh_all"),
            AdminSpanMethod::RefreshOne => info_span!("folio_admin.refresh_one"),
            AdminSpanMethod::LoadList => info_span!("folio_admin.load_list"),
            AdminSpanMethod::LoadDetail => info_span!("folio_admin.load_detail"),
            AdminSpanMethod::MarkRead => info_span!("folio_admin.mark_read"),
            AdminSpanMethod::DeleteMessage => info_span!("folio_admin.delete_message"),
        };
        span.set_attribute("folio.operation.name", method.as_str());
        if let Some(kind) = kind {
            span.set_attribute("folio.resource.kind", kind.path());
        }

        Self { span }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        self.span.clone()
    }

    pub fn on_error(&self, error: &AdminError) {
        // A superseded fetch is expected, not a failure.
        if error.is_cancelled() {
            self.span.set_attribute("folio.cancelled", true);
            return;
        }
        self.span
            .set_attribute("exception.message", error.to_string());
        self.span.set_status(Status::error(error.to_string()));
    }
}

/// Run `future` inside an operation span, marking the span as failed when the
/// operation returns an error.
pub async fn trace_operation<T, Fut>(
    method: AdminSpanMethod,
    kind: Option<ResourceKind>,
    future: Fut,
) -> AdminResult<T>
where
    Fut: Future<Output = AdminResult<T>>,
{
    let span = AdminSpan::new(method, kind);
    let result = future.instrument(span.span()).await;

    if let Err(error) = &result {
        span.on_error(error);
    }
    result
}
