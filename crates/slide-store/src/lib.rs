//! Slide Store
//!
//! The single authoritative container for the lesson being edited.
//!
//! # Overview
//!
//! - [`lesson`]: Lesson and slide domain types
//! - [`state`]: Store state, actions, and the pure transition function
//! - [`store`]: The shared, subscribable [`Store`] handle
//!
//! All mutation goes through [`Store::dispatch`]. The store performs no I/O.

pub mod lesson;
pub mod state;
pub mod store;

pub use lesson::{Lesson, Slide, SlideField, SlideId, SlidePatch, SlideStatus, SlideVariant};
pub use state::{
    reduce, Action, BusyFlag, BusyFlags, Dialog, DialogFlags, StoreDefaults, StoreState, ViewMode,
};
pub use store::{Store, Subscription, SubscriptionId};
