use bon::Builder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Context captured when a task is created
///
/// Used for file name templating and stored as history tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct TaskMetadata {
    pub window_title: Option<String>,
    pub process_name: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
}

impl TaskMetadata {
    pub fn is_empty(&self) -> bool {
        *self == TaskMetadata::default()
    }

    /// Tags persisted alongside a history item
    pub fn to_tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        if let Some(title) = &self.window_title {
            tags.insert("WindowTitle".to_string(), title.clone());
        }
        if let Some(process) = &self.process_name {
            tags.insert("ProcessName".to_string(), process.clone());
        }
        tags
    }

    pub fn from_tags(tags: &BTreeMap<String, String>) -> Self {
        Self {
            window_title: tags.get("WindowTitle").cloned(),
            process_name: tags.get("ProcessName").cloned(),
            image_width: None,
            image_height: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip_keeps_window_context() {
        let metadata = TaskMetadata::builder()
            .window_title("Terminal".to_string())
            .process_name("alacritty".to_string())
            .image_width(800)
            .build();

        let tags = metadata.to_tags();
        assert_eq!(tags.len(), 2);

        let restored = TaskMetadata::from_tags(&tags);
        assert_eq!(restored.window_title.as_deref(), Some("Terminal"));
        assert_eq!(restored.process_name.as_deref(), Some("alacritty"));
        assert_eq!(restored.image_width, None);
    }

    #[test]
    fn test_empty_metadata() {
        assert!(TaskMetadata::default().is_empty());
        assert!(TaskMetadata::default().to_tags().is_empty());
    }
}
