//! Preview module - Sandboxed HTML previews
//!
//! - document.rs: Document composition, error document, iframe sandbox policy
//! - console.rs: Console bridge script, bridge messages, bounded buffer
//! - renderer.rs: Debounced renderer state machine and its task

mod console;
mod document;
mod renderer;

pub use console::{
    bridge_script, BridgeMessage, ConsoleBuffer, ConsoleKind, ConsoleMessage, BRIDGE_SOURCE,
};
pub use document::{
    compose, error_document, escape_html, ComposeOptions, PreviewDocument, PreviewSource,
    SandboxPolicy, SandboxToken,
};
pub use renderer::{
    PreviewEvent, PreviewHandle, PreviewPhase, PreviewRenderer, PreviewSnapshot, PreviewState,
    RenderSurface, SrcdocSurface,
};
