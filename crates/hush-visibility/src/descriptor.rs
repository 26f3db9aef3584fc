use hush_types::models::{GroupId, SendTarget, UserId, VisibilityDescriptor};

use crate::error::{RecipientKind, Result, WhisperError};
use crate::store::Directory;

/// Builds the visibility descriptor for a send.
///
/// Whisper parameters are only accepted on channel targets. Every listed id
/// must resolve; the lists are kept as sets, even where a listed user is also
/// covered by a listed group.
pub fn build_descriptor<D: Directory + ?Sized>(
    directory: &D,
    target: &SendTarget,
    user_ids: &[UserId],
    group_ids: &[GroupId],
) -> Result<Option<VisibilityDescriptor>> {
    let whispered = !user_ids.is_empty() || !group_ids.is_empty();

    if whispered && !matches!(target, SendTarget::Channel { .. }) {
        return Err(WhisperError::UnsupportedContext);
    }

    let Some(descriptor) = VisibilityDescriptor::new(user_ids.iter().copied(), group_ids.iter().copied())
    else {
        return Ok(None);
    };

    for &user_id in &descriptor.user_ids {
        if directory.resolve_user(user_id)?.is_none() {
            return Err(WhisperError::UnknownRecipient { kind: RecipientKind::User, id: user_id.0 });
        }
    }
    for &group_id in &descriptor.group_ids {
        if directory.resolve_group(group_id)?.is_none() {
            return Err(WhisperError::UnknownRecipient { kind: RecipientKind::Group, id: group_id.0 });
        }
    }

    Ok(Some(descriptor))
}
