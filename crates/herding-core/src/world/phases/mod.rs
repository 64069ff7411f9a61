pub(super) mod boundary;
mod index;
pub(super) mod spawn;
mod steering;
