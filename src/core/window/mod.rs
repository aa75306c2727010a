//! Time window computation
//!
//! - [`compute_global_window`] turns configured year/month/day fields into an
//!   ascending [`TimeWindow`](crate::domain::TimeWindow)
//! - [`widen_global_start`] applies a patient-provided start date
//! - [`generate_sub_windows`] splits a window into contiguous pieces
//! - [`build_individual_windows`] derives per-patient windows from anchors
//! - [`WindowPlan`] picks the window for each patient
//! - [`parse_datetime`] is the lenient timestamp parser everything else uses

pub mod date_parse;
pub mod global;
pub mod individual;
pub mod plan;
pub mod sub_windows;

pub use date_parse::{format_timestamp, parse_datetime};
pub use global::{compute_global_window, widen_global_start};
pub use individual::build_individual_windows;
pub use plan::WindowPlan;
pub use sub_windows::{generate_sub_windows, slice_window, SubWindows};
