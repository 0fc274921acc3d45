//! Stateless byte-level kernels shared by the wire codec.
//!
//! * `leb128`: unsigned varint used for every length and count.
//! * `bitcast`: whole-slice moves of fixed-width column storage.

pub mod bitcast;
pub mod leb128;
