pub(crate) mod pack;
pub(crate) mod unpack;

mod dispatch;
pub use dispatch::dispatch;
