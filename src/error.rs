use core::fmt::Debug;

/// Marker for device error types.
///
/// Everything that can go wrong in a device is an ordinary value carried up
/// through `Result`s; this trait only asks that it can be printed when the
/// firmware decides to log it.
pub trait Error: Debug {}
