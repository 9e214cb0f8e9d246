// Internal implementation details. Nothing here is part of the public API.

pub(crate) mod tag_ptr;

pub(crate) use tag_ptr::TagPtr;
