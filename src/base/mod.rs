//! Base types and error handling.
//!
//! Provides foundational types mirroring Chromium's `net/base/` and `net/log/`:
//! - [`NetError`](neterror::NetError): Network error codes matching `net_error_list.h`
//! - [`LoadState`](loadstate::LoadState): Request loading states from `load_states_list.h`
//! - [`RequestPriority`](priority::RequestPriority): Priorities from `request_priority.h`
//! - [`netlog`]: Structured event log used for PAC alerts and errors

pub mod context;
pub mod loadstate;
pub mod netlog;
pub mod neterror;
pub mod priority;
