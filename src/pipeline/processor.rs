//! Business-logic hook invoked by the router.
//!
//! Processors see a message at least once and possibly more; nothing upstream
//! deduplicates, so side effects must be safe to repeat.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    Success,
    Failure(String),
}

impl ProcessingOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

pub trait Processor: Send + Sync {
    fn process(&self, key: &str, payload: &str) -> ProcessingOutcome;
}

impl<F> Processor for F
where
    F: Fn(&str, &str) -> ProcessingOutcome + Send + Sync,
{
    fn process(&self, key: &str, payload: &str) -> ProcessingOutcome {
        self(key, payload)
    }
}

/// Fails any payload containing `keyword` (case-insensitive), otherwise a no-op.
#[derive(Debug, Clone)]
pub struct KeywordFailProcessor {
    keyword: String,
}

impl KeywordFailProcessor {
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
        }
    }
}

impl Default for KeywordFailProcessor {
    fn default() -> Self {
        Self::new("fail")
    }
}

impl Processor for KeywordFailProcessor {
    fn process(&self, _key: &str, payload: &str) -> ProcessingOutcome {
        if payload.to_lowercase().contains(&self.keyword) {
            ProcessingOutcome::failure(format!(
                "simulated processing error for payload: {payload}"
            ))
        } else {
            ProcessingOutcome::Success
        }
    }
}
