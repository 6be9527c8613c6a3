//! Console bridge between the sandboxed preview and the host

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// `source` tag carried by every bridge message
pub const BRIDGE_SOURCE: &str = "coderelay-preview";

/// Console method that produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleKind {
    Log,
    Warn,
    Error,
}

/// One captured console call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub kind: ConsoleKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ConsoleMessage {
    pub fn new(kind: ConsoleKind, text: impl Into<String>) -> Self {
        ConsoleMessage {
            kind,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// `postMessage` payload sent by the bridge script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub source: String,
    pub kind: ConsoleKind,
    #[serde(default)]
    pub text: String,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl BridgeMessage {
    /// Parse a JSON payload; anything not from the bridge yields `None`
    pub fn parse(payload: &str) -> Option<ConsoleMessage> {
        let message: BridgeMessage = serde_json::from_str(payload).ok()?;
        message.into_console()
    }

    pub fn into_console(self) -> Option<ConsoleMessage> {
        if self.source != BRIDGE_SOURCE {
            return None;
        }
        let timestamp = self
            .timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);
        Some(ConsoleMessage {
            kind: self.kind,
            text: self.text,
            timestamp,
        })
    }
}

/// Bounded, emission-ordered console history; the oldest entry is evicted
/// once `capacity` is reached
#[derive(Debug, Clone)]
pub struct ConsoleBuffer {
    messages: VecDeque<ConsoleMessage>,
    capacity: usize,
}

impl ConsoleBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ConsoleBuffer {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: ConsoleMessage) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConsoleMessage> {
        self.messages.iter()
    }

    /// Owned copy, oldest first
    pub fn snapshot(&self) -> Vec<ConsoleMessage> {
        self.messages.iter().cloned().collect()
    }
}

/// Script injected into the preview head. Wraps `console.log/warn/error`
/// and uncaught errors and posts each call to the parent window.
pub fn bridge_script() -> String {
    format!(
        r#"(function () {{
  var post = function (kind, args) {{
    try {{
      var text = Array.prototype.map.call(args, function (a) {{
        if (typeof a === 'string') return a;
        try {{ return JSON.stringify(a); }} catch (e) {{ return String(a); }}
      }}).join(' ');
      parent.postMessage({{ source: '{source}', kind: kind, text: text, timestamp: Date.now() }}, '*');
    }} catch (e) {{}}
  }};
  ['log', 'warn', 'error'].forEach(function (kind) {{
    var original = console[kind];
    console[kind] = function () {{
      post(kind, arguments);
      if (original) original.apply(console, arguments);
    }};
  }});
  window.addEventListener('error', function (e) {{ post('error', [e.message]); }});
}})();"#,
        source = BRIDGE_SOURCE
    )
}
