//! Pipeline stages for slide-deck assembly.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the network can be faked without touching layout or PDF code.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ detect ──▶ compose ──▶ emit
//! (HTTP)    (sniff +   (A4 page   (PDF bytes +
//!            decode)    per image)  filename)
//! ```
//!
//! 1. [`fetch`]: retrieve bytes per locator; failures are per image
//! 2. [`detect`]: classify PNG / JPEG / unknown and decode to an embeddable form
//! 3. [`compose`]: aspect-preserving, centred placement on an 842 × 595 pt page
//! 4. [`emit`]: serialise the document and derive the download filename

pub mod compose;
pub mod detect;
pub mod emit;
pub mod fetch;
