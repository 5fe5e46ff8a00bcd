use std::sync::Mutex;

use log::debug;
use tokio::task::JoinHandle;

use crate::errors::{ClientError, ErrorKind};
use crate::fetch::loader::RemoteLoader;
use crate::Options;

pub(crate) struct Prefetched {
    context_key: String,
    handle: JoinHandle<Result<serde_json::Value, ClientError>>,
}

impl Prefetched {
    pub(crate) async fn outcome(self) -> Result<serde_json::Value, ClientError> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(ClientError::new(
                ErrorKind::HttpRequestFailure,
                format!("The prefetch of the config did not complete. ({err})"),
            )),
        }
    }
}

static PREFETCH: Mutex<Option<Prefetched>> = Mutex::new(None);

/// Starts fetching the configuration for the context of `options` in the background.
///
/// The next [`crate::Client`] load for the same context takes over the in-flight fetch instead
/// of issuing its own request. Starting another prefetch replaces one that was not taken yet.
///
/// # Errors
///
/// This method fails if the HTTP client can't be created.
///
/// # Panics
///
/// This method panics if called outside of a Tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use reforge::{prefetch, EvaluationContext, Options};
///
/// #[tokio::main]
/// async fn main() {
///     let context = EvaluationContext::new().with_attribute("user", "key", "abc");
///     let options = Options::builder("SDK_KEY").context(context).build().unwrap();
///     prefetch(&options).unwrap();
/// }
/// ```
pub fn prefetch(options: &Options) -> Result<(), ClientError> {
    let loader = RemoteLoader::new(options)?;
    let context_key = loader.context().encode();
    let encoded = context_key.clone();
    let handle = tokio::spawn(async move { loader.fetch(&encoded).await });
    if let Ok(mut slot) = PREFETCH.lock() {
        if let Some(replaced) = slot.replace(Prefetched {
            context_key,
            handle,
        }) {
            debug!("Replacing a prefetch that was never claimed");
            replaced.handle.abort();
        }
    }
    Ok(())
}

/// Takes the pending prefetch if it was started for `context_key`.
pub(crate) fn claim(context_key: &str) -> Option<Prefetched> {
    let mut slot = PREFETCH.lock().ok()?;
    match slot.as_ref() {
        Some(pending) if pending.context_key == context_key => slot.take(),
        _ => None,
    }
}
