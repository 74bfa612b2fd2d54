//! Re-send and edit payloads built from received messages.

use topicgram_types::{InputMedia, InputMediaKind, MediaFile, Message};

use crate::error::ValidationError;
use crate::transport::EditAction;

fn with_caption(mut media: InputMedia, msg: &Message) -> InputMedia {
    media.caption = msg.caption.clone();
    media.caption_entities = msg.caption_entities.clone();
    media.show_caption_above_media = msg.show_caption_above_media;
    media.has_spoiler = msg.has_media_spoiler;
    media
}

fn from_file(kind: InputMediaKind, file: &MediaFile) -> InputMedia {
    let mut media = InputMedia::new(kind, &file.file_id);
    media.thumbnail = file.thumbnail.as_ref().map(|t| t.file_id.clone());
    match kind {
        InputMediaKind::Animation | InputMediaKind::Video => {
            media.width = Some(file.width);
            media.height = Some(file.height);
            media.duration = Some(file.duration);
        }
        InputMediaKind::Audio => {
            media.duration = Some(file.duration);
            media.title = file.title.clone();
            media.performer = file.performer.clone();
        }
        InputMediaKind::Document | InputMediaKind::Photo => {}
    }
    media
}

/// Re-sendable media of `msg`. Animations cannot go into albums, so the
/// caller decides whether they count.
fn media_of(msg: &Message, allow_animation: bool) -> Option<InputMedia> {
    let media = match &msg.animation {
        Some(file) if allow_animation => from_file(InputMediaKind::Animation, file),
        _ => {
            if let Some(file) = &msg.audio {
                from_file(InputMediaKind::Audio, file)
            } else if let Some(file) = &msg.document {
                from_file(InputMediaKind::Document, file)
            } else if let Some(photo) = msg.best_photo() {
                InputMedia::new(InputMediaKind::Photo, &photo.file_id)
            } else if let Some(file) = &msg.video {
                from_file(InputMediaKind::Video, file)
            } else {
                return None;
            }
        }
    };
    Some(with_caption(media, msg))
}

/// Album payload for a whole bundle. One unsupported item rejects the
/// bundle.
pub fn album(items: &[Message]) -> Result<Vec<InputMedia>, ValidationError> {
    items
        .iter()
        .map(|msg| media_of(msg, false).ok_or(ValidationError::Unsupported))
        .collect()
}

/// How an edit of `msg` is mirrored onto its counterpart.
pub fn edit_action(msg: &Message) -> Result<EditAction, ValidationError> {
    if !msg.text().is_empty() {
        return Ok(EditAction::Text {
            text: msg.text().to_string(),
            entities: msg.entities.clone(),
        });
    }

    if let Some(media) = media_of(msg, true) {
        return Ok(EditAction::Media(media));
    }

    if msg.voice.is_some() || msg.video_note.is_some() {
        return Ok(EditAction::Caption {
            caption: msg.caption.clone(),
            entities: msg.caption_entities.clone(),
        });
    }

    Err(ValidationError::Unsupported)
}
