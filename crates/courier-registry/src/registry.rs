//! The handler registry: tag → (input shape, handler function).
//!
//! Handlers are registered with their real Rust types and stored
//! type-erased: the stored closure decodes the opaque wire body against
//! the registered input shape, invokes the typed function, and encodes
//! the result back into a document. Shape mismatches become reported
//! [`InvokeError::BadInput`] failures instead of unchecked casts.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use courier_protocol::{from_document, to_document, MessageType};

use crate::InvokeError;

type ErasedHandler = dyn Fn(&Value) -> Result<Value, InvokeError> + Send + Sync;

/// One registered binding: the expected input shape plus the erased
/// handler function.
///
/// Cheap to clone — the function is behind an `Arc`, so a dispatch task
/// can take its own copy and invoke outside any registry lock.
#[derive(Clone)]
pub struct RegisteredHandler {
    input_shape: &'static str,
    func: Arc<ErasedHandler>,
}

impl RegisteredHandler {
    /// Decodes `body` against the registered input shape, invokes the
    /// handler, and encodes its result.
    pub fn invoke(&self, body: &Value) -> Result<Value, InvokeError> {
        (self.func)(body)
    }

    /// The type name of the input shape this handler expects.
    /// Diagnostic only — not part of the wire contract.
    pub fn input_shape(&self) -> &'static str {
        self.input_shape
    }
}

impl std::fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("input_shape", &self.input_shape)
            .finish_non_exhaustive()
    }
}

/// The type-keyed handler table.
///
/// Safe to share behind an `Arc` and call from any thread: `lookup`
/// takes the read lock, `register` the write lock. At most one handler
/// is bound per tag — registering again replaces the previous binding,
/// and the replacement is surfaced both as a warning log and as the
/// `true` return value (silent handler replacement in a long-lived
/// process is painful to diagnose after the fact).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<MessageType, RegisteredHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `tag` to an infallible handler function.
    ///
    /// Returns `true` if an existing binding for the same tag was
    /// replaced.
    pub fn register<IN, OUT, F>(&self, tag: impl Into<MessageType>, f: F) -> bool
    where
        IN: DeserializeOwned + 'static,
        OUT: Serialize + 'static,
        F: Fn(IN) -> OUT + Send + Sync + 'static,
    {
        self.register_fallible(tag, move |input: IN| Ok(f(input)))
    }

    /// Binds `tag` to a handler that may report a failure.
    ///
    /// The failure string travels back to the original sender in a
    /// `handler-failed` reply. Returns `true` on replacement.
    pub fn register_fallible<IN, OUT, F>(
        &self,
        tag: impl Into<MessageType>,
        f: F,
    ) -> bool
    where
        IN: DeserializeOwned + 'static,
        OUT: Serialize + 'static,
        F: Fn(IN) -> Result<OUT, String> + Send + Sync + 'static,
    {
        let tag = tag.into();
        let input_shape = type_name::<IN>();

        let func = move |body: &Value| -> Result<Value, InvokeError> {
            let input: IN =
                from_document(body).map_err(|e| InvokeError::BadInput {
                    expected: input_shape,
                    detail: e.to_string(),
                })?;
            let output = f(input).map_err(InvokeError::Failed)?;
            to_document(&output).map_err(|e| InvokeError::Failed(e.to_string()))
        };

        let handler = RegisteredHandler {
            input_shape,
            func: Arc::new(func),
        };

        let previous = self
            .handlers
            .write()
            .expect("handler table poisoned")
            .insert(tag.clone(), handler);

        match previous {
            Some(old) => {
                tracing::warn!(
                    %tag,
                    old_shape = old.input_shape,
                    new_shape = input_shape,
                    "handler replaced"
                );
                true
            }
            None => {
                tracing::debug!(%tag, shape = input_shape, "handler registered");
                false
            }
        }
    }

    /// Returns the handler currently bound to `tag`, if any.
    pub fn lookup(&self, tag: &MessageType) -> Option<RegisteredHandler> {
        self.handlers
            .read()
            .expect("handler table poisoned")
            .get(tag)
            .cloned()
    }

    /// Number of registered bindings.
    pub fn len(&self) -> usize {
        self.handlers.read().expect("handler table poisoned").len()
    }

    /// Whether the registry has no bindings.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The tags currently bound, in no particular order.
    pub fn registered_types(&self) -> Vec<MessageType> {
        self.handlers
            .read()
            .expect("handler table poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

// =========================================================================
// Tests
// =========================================================================
