//! Screen geometry of the board, kept separate from drawing so mouse hit
//! tests and drag slots can be computed (and tested) without a terminal.

use ratatui::layout::{Constraint, Layout, Rect};

use crate::model::TaskId;
use crate::ordering::Slot;

/// Rows per card: top border, title, bottom border.
pub const CARD_HEIGHT: u16 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardArea {
    pub task_id: TaskId,
    /// Row of the card's top edge as if the column never scrolled. May lie
    /// outside the screen.
    pub virtual_top: i32,
    /// Where it is drawn, if it is on screen.
    pub rect: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnArea {
    pub column: String,
    pub rect: Rect,
    pub cards: Vec<CardArea>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardLayout {
    pub columns: Vec<ColumnArea>,
}

/// How many cards fit inside a bordered column of `height` rows.
pub fn capacity(height: u16) -> usize {
    (height.saturating_sub(2) / CARD_HEIGHT) as usize
}

/// First card to draw so that `selected` stays on screen.
pub fn scroll_offset(selected: usize, capacity: usize) -> usize {
    if capacity == 0 {
        0
    } else {
        selected.saturating_sub(capacity - 1)
    }
}

impl BoardLayout {
    /// Lay `columns` side by side across `area`. Each entry is a column name,
    /// its task ids in display order, and how many cards are scrolled off the
    /// top.
    pub fn compute(area: Rect, columns: &[(String, Vec<TaskId>, usize)]) -> Self {
        if columns.is_empty() {
            return Self::default();
        }
        let rects = Layout::horizontal(vec![Constraint::Fill(1); columns.len()]).split(area);
        let columns = columns
            .iter()
            .zip(rects.iter())
            .map(|((column, ids, offset), rect)| ColumnArea {
                column: column.clone(),
                rect: *rect,
                cards: place_cards(*rect, ids, *offset),
            })
            .collect();
        Self { columns }
    }

    pub fn column_at(&self, x: u16, y: u16) -> Option<&ColumnArea> {
        self.columns.iter().find(|c| contains(c.rect, x, y))
    }

    pub fn card_at(&self, x: u16, y: u16) -> Option<TaskId> {
        self.column_at(x, y)?
            .cards
            .iter()
            .find(|card| card.rect.is_some_and(|r| contains(r, x, y)))
            .map(|card| card.task_id)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnArea> {
        self.columns.iter().find(|c| c.column == name)
    }
}

impl ColumnArea {
    /// Drag geometry for this column, every card included.
    pub fn slots(&self) -> Vec<Slot> {
        self.cards
            .iter()
            .map(|card| Slot {
                task_id: card.task_id,
                top: f64::from(card.virtual_top),
                height: f64::from(CARD_HEIGHT),
            })
            .collect()
    }
}

fn place_cards(column: Rect, ids: &[TaskId], offset: usize) -> Vec<CardArea> {
    let inner_top = i32::from(column.y) + 1;
    let inner_bottom = i32::from(column.y) + i32::from(column.height) - 1;
    let height = i32::from(CARD_HEIGHT);
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let virtual_top = inner_top + (i as i32 - offset as i32) * height;
            let on_screen = virtual_top >= inner_top && virtual_top + height <= inner_bottom;
            let rect = on_screen.then(|| {
                Rect::new(
                    column.x + 1,
                    virtual_top as u16,
                    column.width.saturating_sub(2),
                    CARD_HEIGHT,
                )
            });
            CardArea {
                task_id: *id,
                virtual_top,
                rect,
            }
        })
        .collect()
}

fn contains(rect: Rect, x: u16, y: u16) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> BoardLayout {
        BoardLayout::compute(
            Rect::new(0, 0, 40, 12),
            &[
                ("planned".into(), vec![1, 2, 3, 4], 0),
                ("completed".into(), vec![9], 0),
            ],
        )
    }

    #[test]
    fn columns_split_evenly() {
        let layout = layout();
        assert_eq!(layout.columns[0].rect, Rect::new(0, 0, 20, 12));
        assert_eq!(layout.columns[1].rect, Rect::new(20, 0, 20, 12));
    }

    #[test]
    fn cards_stack_below_border_and_overflow_is_hidden() {
        let layout = layout();
        let cards = &layout.columns[0].cards;
        assert_eq!(cards[0].rect, Some(Rect::new(1, 1, 18, 3)));
        assert_eq!(cards[2].rect, Some(Rect::new(1, 7, 18, 3)));
        // Inner height is 10 rows: three cards fit, the fourth doesn't.
        assert_eq!(cards[3].rect, None);
        assert_eq!(cards[3].virtual_top, 10);
        assert_eq!(capacity(12), 3);
    }

    #[test]
    fn hit_testing() {
        let layout = layout();
        assert_eq!(layout.card_at(5, 2), Some(1));
        assert_eq!(layout.card_at(5, 5), Some(2));
        assert_eq!(layout.card_at(25, 1), Some(9));
        assert_eq!(layout.card_at(25, 6), None);
        assert_eq!(layout.column_at(25, 6).unwrap().column, "completed");
        assert!(layout.column_at(50, 6).is_none());
    }

    #[test]
    fn scrolled_column_keeps_virtual_tops() {
        let layout = BoardLayout::compute(
            Rect::new(0, 0, 20, 8),
            &[("planned".into(), vec![1, 2, 3], 2)],
        );
        let cards = &layout.columns[0].cards;
        assert_eq!(cards[0].virtual_top, -5);
        assert_eq!(cards[0].rect, None);
        assert_eq!(cards[2].rect, Some(Rect::new(1, 1, 18, 3)));
        let slots = layout.columns[0].slots();
        assert_eq!(slots[2].top, 1.0);
        assert_eq!(slots[0].top, -5.0);
    }

    #[test]
    fn scroll_keeps_selection_visible() {
        assert_eq!(scroll_offset(0, 3), 0);
        assert_eq!(scroll_offset(2, 3), 0);
        assert_eq!(scroll_offset(5, 3), 3);
        assert_eq!(scroll_offset(5, 0), 0);
    }
}
