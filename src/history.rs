use crate::stroke::StrokeRef;

/// Linear undo/redo history of committed strokes
#[derive(Debug, Default, Clone)]
pub struct StrokeHistory {
    /// Strokes that can be undone, most recent last
    undo_stack: Vec<StrokeRef>,
    /// Strokes that can be redone, most recently undone last
    redo_stack: Vec<StrokeRef>,
}

impl StrokeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly committed stroke. Invalidates the redo history.
    pub fn record(&mut self, stroke: StrokeRef) {
        self.undo_stack.push(stroke);
        self.redo_stack.clear();
    }

    /// Move the most recent stroke to the redo stack and return it
    pub fn undo(&mut self) -> Option<StrokeRef> {
        let stroke = self.undo_stack.pop()?;
        self.redo_stack.push(stroke.clone());
        Some(stroke)
    }

    /// Move the most recently undone stroke back and return it
    pub fn redo(&mut self) -> Option<StrokeRef> {
        let stroke = self.redo_stack.pop()?;
        self.undo_stack.push(stroke.clone());
        Some(stroke)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
