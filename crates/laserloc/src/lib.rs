#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use laserloc_3d as l3d;

#[doc(inline)]
pub use laserloc_scan as scan;

#[doc(inline)]
pub use laserloc_icp as icp;

#[doc(inline)]
pub use laserloc_localizer as localizer;
