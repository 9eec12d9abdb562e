pub(crate) mod serve;
pub(crate) mod shared;
pub(crate) mod status;
pub(crate) mod sync;
