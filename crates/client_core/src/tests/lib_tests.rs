use super::*;

use shared::protocol::DEFAULT_IMAGE_PROMPT;

fn upload(mime_type: &str, size: usize) -> ImageUpload {
    ImageUpload {
        file_name: "photo".into(),
        mime_type: mime_type.into(),
        source: "/tmp/photo".into(),
        bytes: vec![0; size],
    }
}

fn validation_message(result: ClientResult<TurnRequest>) -> String {
    match result {
        Err(ClientError::Validation(message)) => message,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn chat_text_is_trimmed() {
    let validated = TurnRequest::Chat("  Hello there \n".into())
        .validated(DEFAULT_IMAGE_PROMPT)
        .expect("valid");
    assert!(matches!(validated, TurnRequest::Chat(ref text) if text == "Hello there"));
}

#[test]
fn blank_chat_text_is_rejected() {
    let message = validation_message(TurnRequest::Chat(" \t ".into()).validated(DEFAULT_IMAGE_PROMPT));
    assert_eq!(message, "Message cannot be empty");
}

#[test]
fn chat_length_limit_counts_characters() {
    let at_limit = "é".repeat(MAX_MESSAGE_CHARS);
    assert!(TurnRequest::Chat(at_limit)
        .validated(DEFAULT_IMAGE_PROMPT)
        .is_ok());

    let over = "a".repeat(MAX_MESSAGE_CHARS + 1);
    let message = validation_message(TurnRequest::Chat(over).validated(DEFAULT_IMAGE_PROMPT));
    assert!(message.starts_with("Message too long"));
}

#[test]
fn image_without_prompt_gets_default() {
    let validated = TurnRequest::Image {
        upload: upload("image/jpeg", 16),
        prompt: Some("   ".into()),
    }
    .validated("Describe briefly.")
    .expect("valid");

    match validated {
        TurnRequest::Image { prompt, .. } => assert_eq!(prompt.as_deref(), Some("Describe briefly.")),
        other => panic!("unexpected request {other:?}"),
    }
}

#[test]
fn image_limits_are_enforced() {
    let message = validation_message(
        TurnRequest::Image {
            upload: upload("image/png", MAX_IMAGE_BYTES + 1),
            prompt: None,
        }
        .validated(DEFAULT_IMAGE_PROMPT),
    );
    assert_eq!(message, "File too large. Max size: 10MB");

    let message = validation_message(
        TurnRequest::Image {
            upload: upload("image/bmp", 16),
            prompt: None,
        }
        .validated(DEFAULT_IMAGE_PROMPT),
    );
    assert!(message.starts_with("Unsupported file type"));

    let message = validation_message(
        TurnRequest::Image {
            upload: upload("image/webp", 16),
            prompt: Some("x".repeat(MAX_IMAGE_PROMPT_CHARS + 1)),
        }
        .validated(DEFAULT_IMAGE_PROMPT),
    );
    assert!(message.starts_with("Description too long"));
}

#[test]
fn turn_kind_follows_request_variant() {
    assert_eq!(TurnRequest::Chat("hi".into()).kind(), TurnKind::Chat);
    assert_eq!(
        TurnRequest::Image {
            upload: upload("image/gif", 1),
            prompt: None,
        }
        .kind(),
        TurnKind::Image
    );
}

#[tokio::test]
async fn image_upload_reads_file_and_guesses_type() {
    let dir = std::env::temp_dir().join(format!("chat_client_upload_{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.expect("create dir");
    let path = dir.join("sunset.webp");
    tokio::fs::write(&path, [1u8, 2, 3]).await.expect("write");

    let upload = ImageUpload::from_path(&path).await.expect("read upload");

    assert_eq!(upload.file_name, "sunset.webp");
    assert_eq!(upload.mime_type, "image/webp");
    assert_eq!(upload.bytes, [1, 2, 3]);
    assert_eq!(upload.source, path.display().to_string());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn missing_image_file_is_a_validation_error() {
    let path = std::env::temp_dir().join("chat_client_missing_image.png");
    let err = ImageUpload::from_path(&path).await.err().expect("missing file");
    assert!(matches!(err, ClientError::Validation(_)));
}
