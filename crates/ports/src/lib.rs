#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Palisade Ports
//!
//! The port type system: the closed data-type algebra carried by every
//! component port, the compatibility relation the graph compiler enforces on
//! connections, and the value-coercion table the activity runtime applies to
//! routed inputs.
//!
//! - [`DataType`] — primitive / list / map / contract algebra
//! - [`DataType::accepts`] — connection compatibility (compile time)
//! - [`coerce`] — value coercion (run time; lossy conversions are warnings,
//!   never hard errors)
//! - [`PortSpec`] / [`PortSet`] — per-port schema, requiredness, defaults,
//!   editor hints and value priority

pub mod coerce;
pub mod datatype;
pub mod spec;

pub use coerce::{CoercionOutcome, coerce};
pub use datatype::{DataType, PrimitiveType};
pub use spec::{PortEditor, PortSet, PortSpec, ValuePriority, single_port};
