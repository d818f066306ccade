use taskflow_protocol::request::{ChatMessage, ChatRequestBody, FileAttachment, ImageAttachment, Role};

/// Normalized skill input. File attachments are already folded into the text.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillInput {
    pub messages: Vec<ChatMessage>,
    pub images: Vec<ImageAttachment>,
    pub temperature: f32,
    pub enable_tools: bool,
}

impl SkillInput {
    pub fn from_request(request: &ChatRequestBody, default_temperature: f32, max_file_chars: usize) -> Self {
        let mut messages = request.messages.clone();
        fold_files(&mut messages, &request.files, max_file_chars);
        Self {
            messages,
            images: request.images.clone(),
            temperature: request.temperature.unwrap_or(default_temperature),
            enable_tools: request.enable_tools,
        }
    }
}

/// Append each file to the last user message as a labelled block.
/// Adds a user message when the history has none.
pub fn fold_files(messages: &mut Vec<ChatMessage>, files: &[FileAttachment], max_chars: usize) {
    if files.is_empty() {
        return;
    }

    let idx = match messages.iter().rposition(|m| m.role == Role::User) {
        Some(idx) => idx,
        None => {
            messages.push(ChatMessage::user(""));
            messages.len() - 1
        }
    };

    let target = &mut messages[idx].content;
    for file in files {
        target.push_str(&format!("\n\n[File: {} ({})]\n", file.name, file.mime_type));
        target.push_str(&truncate_chars(&file.content, max_chars));
    }
}

fn truncate_chars(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((cut, _)) => {
            let dropped = content[cut..].chars().count();
            format!("{}\n[truncated: {dropped} more characters]", &content[..cut])
        }
    }
}
