//! Ownership checks for the mutation endpoints.
//!
//! Every check is evaluated fresh on each request against the loaded entity.
//! Callers are already authenticated; anonymous requests never get here.

use crate::error::BlogError;
use crate::middleware::AuthenticatedUser;
use crate::models::{Comment, Post, PostAction};

pub fn can_edit_post(viewer: &AuthenticatedUser, post: &Post) -> bool {
    viewer.id == post.author_id
}

pub fn can_delete_post(viewer: &AuthenticatedUser, post: &Post) -> bool {
    viewer.id == post.author_id
}

/// Comment rights follow the comment's author only. The author of the
/// parent post has no say.
pub fn can_edit_comment(viewer: &AuthenticatedUser, comment: &Comment) -> bool {
    viewer.id == comment.author_id
}

pub fn can_delete_comment(viewer: &AuthenticatedUser, comment: &Comment) -> bool {
    viewer.id == comment.author_id
}

pub fn can_perform_post_action(viewer: &AuthenticatedUser, post: &Post, action: PostAction) -> bool {
    match action {
        PostAction::Edit => can_edit_post(viewer, post),
        PostAction::Delete => can_delete_post(viewer, post),
    }
}

/// What a refused post mutation looks like to the viewer: editing bounces
/// back to the post, deleting is reported as a missing page.
pub fn post_denial(post: &Post, action: PostAction) -> BlogError {
    match action {
        PostAction::Edit => BlogError::PermissionDenied { redirect_to: format!("/posts/{}/", post.id) },
        PostAction::Delete => BlogError::NotFound,
    }
}
