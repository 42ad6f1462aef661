//! Attachment handling — classifies Discord attachments and converts them
//! into the shapes C1 understands: images become `conductor_core`
//! `Attachment` values, everything else becomes an inline text note folded
//! into the utterance (C1 itself only has a concept of image attachments).

use base64::Engine;
use conductor_core::conversation::Attachment;
use serenity::model::channel::Attachment as DiscordAttachment;
use tracing::warn;

pub enum AttachmentKind {
    Image,
    Text,
    Other,
}

pub fn classify(attachment: &DiscordAttachment) -> AttachmentKind {
    let ct = attachment.content_type.as_deref().unwrap_or("");
    if ct.starts_with("image/") {
        AttachmentKind::Image
    } else if ct.starts_with("text/") || is_text_extension(&attachment.filename) {
        AttachmentKind::Text
    } else {
        AttachmentKind::Other
    }
}

fn is_animated(attachment: &DiscordAttachment) -> bool {
    let ct = attachment.content_type.as_deref().unwrap_or("");
    ct == "image/gif" || attachment.filename.to_lowercase().ends_with(".gif")
}

/// Download and convert `attachments` into C1's `Attachment` list (images
/// only) plus a list of extra text notes (file contents, skip/placeholder
/// notices) to append to the utterance before it reaches `collect()`.
///
/// There is no GIF frame-splitting library in this stack, so an animated
/// source is passed through as a single frame; `collect()`'s
/// `max_animated_frames` budget is still honored, it's just never the
/// binding constraint here.
pub async fn to_collect_attachments(
    attachments: &[DiscordAttachment],
    max_bytes: u64,
) -> (Vec<Attachment>, Vec<String>) {
    let mut images = Vec::new();
    let mut notes = Vec::new();

    for att in attachments {
        if u64::from(att.size) > max_bytes {
            notes.push(format!("[Attachment '{}' skipped: {} bytes exceeds limit]", att.filename, att.size));
            continue;
        }

        match classify(att) {
            AttachmentKind::Image => match download_bytes(&att.url).await {
                Ok(bytes) => {
                    let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
                    let mime = att.content_type.clone().unwrap_or_else(|| "image/png".to_string());
                    let animated = is_animated(att);
                    images.push(Attachment {
                        mime,
                        base64: if animated { String::new() } else { b64.clone() },
                        animated,
                        frames: if animated { vec![b64] } else { Vec::new() },
                    });
                }
                Err(e) => {
                    warn!(filename = %att.filename, error = %e, "failed to download image attachment");
                    notes.push(format!("[Image '{}' download failed: {}]", att.filename, e));
                }
            },
            AttachmentKind::Text => match download_text(&att.url).await {
                Ok(text) => notes.push(format!("--- {} ---\n{}", att.filename, text)),
                Err(e) => {
                    warn!(filename = %att.filename, error = %e, "failed to download text attachment");
                    notes.push(format!("[File '{}' download failed: {}]", att.filename, e));
                }
            },
            AttachmentKind::Other => {
                let ct = att.content_type.as_deref().unwrap_or("unknown");
                notes.push(format!("[Attachment: '{}' ({}, {} bytes)]", att.filename, ct, att.size));
            }
        }
    }

    (images, notes)
}

fn is_text_extension(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    matches!(
        lower.rsplit('.').next(),
        Some(
            "txt" | "md" | "rs" | "py" | "js" | "ts" | "json" | "toml" | "yaml" | "yml" | "xml" | "html" | "css"
                | "csv" | "log" | "sh" | "cfg" | "ini" | "conf" | "go" | "java" | "c" | "cpp" | "h"
        )
    )
}

async fn download_bytes(url: &str) -> Result<Vec<u8>, reqwest::Error> {
    reqwest::get(url).await?.bytes().await.map(|b| b.to_vec())
}

async fn download_text(url: &str) -> Result<String, reqwest::Error> {
    reqwest::get(url).await?.text().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_extension_detected_case_insensitively() {
        assert!(is_text_extension("notes.MD"));
        assert!(!is_text_extension("photo.png"));
    }
}
