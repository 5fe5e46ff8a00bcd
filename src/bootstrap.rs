use crate::EvaluationContext;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Pre-fetched evaluations used to seed the [`crate::Client`] without a network call.
///
/// The evaluations are adopted only when `context` equals the client's context.
///
/// # Examples
///
/// ```rust
/// use reforge::{Bootstrap, EvaluationContext};
///
/// let bootstrap: Bootstrap = serde_json::from_str(r#"{
///     "context": {"user": {"key": "abc"}},
///     "evaluations": {"turbo": {"value": {"double": 2.5}}}
/// }"#).unwrap();
///
/// assert_eq!(bootstrap.context, EvaluationContext::new().with_attribute("user", "key", "abc"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bootstrap {
    /// The context the evaluations were made for.
    pub context: EvaluationContext,
    /// The `evaluations` object of an evaluation payload.
    pub evaluations: serde_json::Value,
}

impl Bootstrap {
    /// Creates a new [`Bootstrap`].
    pub fn new(context: EvaluationContext, evaluations: serde_json::Value) -> Self {
        Self {
            context,
            evaluations,
        }
    }

    pub(crate) fn payload(&self) -> serde_json::Value {
        serde_json::json!({ "evaluations": self.evaluations })
    }
}

/// A read-once handoff slot.
pub(crate) struct BootstrapSlot {
    inner: Mutex<Option<Bootstrap>>,
}

impl BootstrapSlot {
    pub(crate) const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub(crate) fn put(&self, bootstrap: Bootstrap) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(bootstrap);
        }
    }

    pub(crate) fn claim(&self) -> Option<Bootstrap> {
        self.inner.lock().ok().and_then(|mut slot| slot.take())
    }
}

static GLOBAL_BOOTSTRAP: BootstrapSlot = BootstrapSlot::new();

/// Parks a [`Bootstrap`] in the process-wide slot.
///
/// The next [`crate::Client::init`] whose options carry no bootstrap takes it from the slot.
/// Injecting again replaces a bootstrap that was not taken yet.
pub fn inject_bootstrap(bootstrap: Bootstrap) {
    GLOBAL_BOOTSTRAP.put(bootstrap);
}

pub(crate) fn claim_global() -> Option<Bootstrap> {
    GLOBAL_BOOTSTRAP.claim()
}
