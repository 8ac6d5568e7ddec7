//! Toast-style notification surface.
//!
//! The session emits notices; rendering them belongs to the embedding UI.
//! This is a call surface only — a sink is optional and nothing in the
//! pipeline depends on one being present.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: NoticeKind::Success,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: NoticeKind::Error,
        }
    }
}

pub trait NoticeSink: Send {
    fn notify(&mut self, notice: Notice);
}

/// Collects notices for tests. Clone the collector, hand its `sink()` to
/// the session, and inspect what arrived.
#[derive(Clone, Default)]
pub struct NoticeCollector {
    notices: std::sync::Arc<std::sync::Mutex<Vec<Notice>>>,
}

impl NoticeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> Box<dyn NoticeSink> {
        Box::new(CollectorSink(std::sync::Arc::clone(&self.notices)))
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

struct CollectorSink(std::sync::Arc<std::sync::Mutex<Vec<Notice>>>);

impl NoticeSink for CollectorSink {
    fn notify(&mut self, notice: Notice) {
        self.0.lock().unwrap().push(notice);
    }
}
