//! Selection policies.
//!
//! Each policy maps the current control value, plus randomness where the
//! policy needs it, to the code path the measured operation takes:
//!
//! - [`branch`]: biased sign of a random integer
//! - [`dispatch`]: which calculator implementation to call
//! - [`nullable`]: whether the value handed to the operation is present

pub mod branch;
pub mod dispatch;
pub mod nullable;

pub use dispatch::{Calculator, CalculatorKind, Calculators, DispatchMode, DispatchPolicy};
pub use nullable::AbsentValue;
