//! Follow-mode scrolling for the log list
//!
//! Offsets and distances are in rendered rows of the log list, so a record
//! shown with its details counts once per row it occupies. The controller
//! only moves the viewport; it never touches buffered or filtered records.

/// Whether new content should pull the viewport to the bottom
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowMode {
    Pinned,
    Unpinned,
}

#[derive(Clone, Debug)]
pub struct FollowController {
    mode: FollowMode,
    /// First visible row
    offset: usize,
    content_len: usize,
    viewport: usize,
    /// Rows above the bottom that still count as "at the bottom"
    threshold: usize,
}

impl FollowController {
    pub fn new(threshold: usize) -> Self {
        Self {
            mode: FollowMode::Pinned,
            offset: 0,
            content_len: 0,
            viewport: 0,
            threshold,
        }
    }

    pub fn mode(&self) -> FollowMode {
        self.mode
    }

    pub fn is_pinned(&self) -> bool {
        self.mode == FollowMode::Pinned
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Largest offset that still fills the viewport
    fn bottom(&self) -> usize {
        self.content_len.saturating_sub(self.viewport)
    }

    pub fn distance_from_bottom(&self) -> usize {
        self.bottom().saturating_sub(self.offset)
    }

    /// Record the visible height in rows
    pub fn set_viewport(&mut self, rows: usize) {
        self.viewport = rows;
        self.settle();
    }

    /// Content height in rows changed (arrival, eviction, filter change,
    /// reload or a details toggle)
    pub fn on_content_changed(&mut self, len: usize) {
        self.content_len = len;
        self.settle();
    }

    fn settle(&mut self) {
        match self.mode {
            FollowMode::Pinned => self.offset = self.bottom(),
            FollowMode::Unpinned => self.offset = self.offset.min(self.bottom()),
        }
    }

    /// User moved the viewport to `offset`
    pub fn on_user_scroll(&mut self, offset: usize) {
        self.offset = offset.min(self.bottom());
        self.mode = if self.distance_from_bottom() > self.threshold {
            FollowMode::Unpinned
        } else {
            FollowMode::Pinned
        };
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.on_user_scroll(self.offset.saturating_sub(rows));
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.on_user_scroll(self.offset.saturating_add(rows));
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.viewport.max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.viewport.max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.on_user_scroll(0);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.mode = FollowMode::Pinned;
        self.offset = self.bottom();
    }

    /// Follow key: unpin in place, or jump back to the bottom
    pub fn toggle(&mut self) {
        match self.mode {
            FollowMode::Pinned => self.mode = FollowMode::Unpinned,
            FollowMode::Unpinned => self.scroll_to_bottom(),
        }
    }

    /// Start over for a new channel
    pub fn reset(&mut self) {
        self.mode = FollowMode::Pinned;
        self.offset = 0;
        self.content_len = 0;
    }
}

impl Default for FollowController {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(len: usize, viewport: usize) -> FollowController {
        let mut follow = FollowController::new(2);
        follow.set_viewport(viewport);
        follow.on_content_changed(len);
        follow
    }

    #[test]
    fn test_pinned_follows_arrivals() {
        let mut follow = controller(100, 10);
        assert!(follow.is_pinned());
        assert_eq!(follow.offset(), 90);

        follow.on_content_changed(101);
        assert_eq!(follow.offset(), 91);
        assert_eq!(follow.distance_from_bottom(), 0);
    }

    #[test]
    fn test_unpinned_keeps_offset_on_arrival() {
        let mut follow = controller(100, 10);
        follow.scroll_up(30);
        assert_eq!(follow.mode(), FollowMode::Unpinned);
        assert_eq!(follow.offset(), 60);

        follow.on_content_changed(150);
        assert_eq!(follow.offset(), 60);
        assert_eq!(follow.mode(), FollowMode::Unpinned);
    }

    #[test]
    fn test_small_scroll_stays_pinned() {
        let mut follow = controller(100, 10);
        follow.scroll_up(2);
        assert!(follow.is_pinned());

        follow.scroll_up(1);
        assert!(!follow.is_pinned());
    }

    #[test]
    fn test_scrolling_back_near_bottom_repins() {
        let mut follow = controller(100, 10);
        follow.scroll_up(20);
        assert!(!follow.is_pinned());

        follow.scroll_down(19);
        assert!(follow.is_pinned());
        follow.on_content_changed(101);
        assert_eq!(follow.offset(), 91);
    }

    #[test]
    fn test_unpinned_clamps_when_content_shrinks() {
        let mut follow = controller(100, 10);
        follow.scroll_to_top();
        assert_eq!(follow.offset(), 0);
        follow.scroll_down(50);
        assert!(!follow.is_pinned());

        follow.on_content_changed(20);
        assert_eq!(follow.offset(), 10);
    }

    #[test]
    fn test_toggle_and_reset() {
        let mut follow = controller(100, 10);
        follow.toggle();
        assert!(!follow.is_pinned());
        follow.on_content_changed(120);
        assert_eq!(follow.offset(), 90);

        follow.toggle();
        assert!(follow.is_pinned());
        assert_eq!(follow.offset(), 110);

        follow.scroll_up(50);
        follow.reset();
        assert!(follow.is_pinned());
        assert_eq!(follow.offset(), 0);
    }

    #[test]
    fn test_content_shorter_than_viewport() {
        let mut follow = controller(3, 10);
        assert_eq!(follow.offset(), 0);
        follow.scroll_up(5);
        assert!(follow.is_pinned());
        follow.page_down();
        assert_eq!(follow.offset(), 0);
    }
}
