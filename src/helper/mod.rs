pub mod authorization;
pub mod blog_helpers;
pub mod form_helpers;
pub mod media_helpers;
pub mod pagination;
pub mod visibility;
