//! Context-menu capture of user-highlighted text.
use crate::coordinator::CoordinatorHandle;
use crate::messages::DeliveryError;
use crate::model::PageId;

pub const MENU_ID: &str = "generate-from-selection";
pub const MENU_TITLE: &str = "Generate cover letter from selection";

/// Non-blank text the user highlighted in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCapture {
    page: PageId,
    text: String,
}

impl SelectionCapture {
    /// `None` when there is nothing selected; the menu entry is not offered then.
    pub fn from_selection(page: PageId, selection: Option<&str>) -> Option<Self> {
        let text = selection?.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            page,
            text: text.to_string(),
        })
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hand the selection to the coordinator. No latch: every invocation is sent.
    pub async fn deliver(self, coordinator: &CoordinatorHandle) -> Result<(), DeliveryError> {
        coordinator.highlight(self.page, &self.text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_only_for_real_selection() {
        assert!(SelectionCapture::from_selection(PageId(1), None).is_none());
        assert!(SelectionCapture::from_selection(PageId(1), Some("  \n ")).is_none());
        let cap = SelectionCapture::from_selection(PageId(1), Some("  Staff Engineer ")).unwrap();
        assert_eq!(cap.text(), "Staff Engineer");
        assert_eq!(cap.page(), PageId(1));
    }
}
