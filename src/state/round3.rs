use std::time::SystemTime;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::state::game::Round3Question;

/// Buzzer-round questions and the instructor's current selection.
#[derive(Debug, Clone, Default)]
pub struct Round3Board {
    questions: IndexMap<Uuid, Round3Question>,
    current: Option<Uuid>,
}

impl Round3Board {
    /// Questions in running order.
    pub fn sorted(&self) -> Vec<Round3Question> {
        let mut questions: Vec<Round3Question> = self.questions.values().cloned().collect();
        questions.sort_by_key(|question| question.sequence_order);
        questions
    }

    pub fn get(&self, id: Uuid) -> Option<&Round3Question> {
        self.questions.get(&id)
    }

    pub fn current_id(&self) -> Option<Uuid> {
        self.current
    }

    /// Selected question, if it still exists.
    pub fn current(&self) -> Option<&Round3Question> {
        self.current.and_then(|id| self.questions.get(&id))
    }

    /// The unlocked question, if any.
    pub fn active(&self) -> Option<&Round3Question> {
        self.questions.values().find(|question| question.is_active)
    }

    /// Next free position in the running order.
    pub fn next_sequence(&self) -> u32 {
        self.questions
            .values()
            .map(|question| question.sequence_order)
            .max()
            .map_or(1, |max| max + 1)
    }

    pub fn insert(&mut self, question: Round3Question) {
        self.questions.insert(question.id, question);
    }

    /// Point the selection at `id`; returns `false` when the question is unknown.
    pub fn select(&mut self, id: Uuid) -> bool {
        if !self.questions.contains_key(&id) {
            return false;
        }
        self.current = Some(id);
        true
    }

    pub fn clear_selection(&mut self) {
        self.current = None;
    }

    /// Unlock `id` at `at`, lock every other question and select it.
    ///
    /// Returns the questions whose state changed, or `None` for an unknown id.
    pub fn activate(&mut self, id: Uuid, at: SystemTime) -> Option<Vec<Round3Question>> {
        if !self.questions.contains_key(&id) {
            return None;
        }
        let mut changed = self.lock_all_except(Some(id));
        if let Some(question) = self.questions.get_mut(&id) {
            question.is_active = true;
            question.activated_at = Some(at);
            changed.push(question.clone());
        }
        self.current = Some(id);
        Some(changed)
    }

    /// Lock every question; returns the ones that were unlocked.
    pub fn deactivate_all(&mut self) -> Vec<Round3Question> {
        self.lock_all_except(None)
    }

    fn lock_all_except(&mut self, keep: Option<Uuid>) -> Vec<Round3Question> {
        self.questions
            .values_mut()
            .filter(|question| question.is_active && Some(question.id) != keep)
            .map(|question| {
                question.is_active = false;
                question.clone()
            })
            .collect()
    }

    /// Replace the board content with persisted data.
    pub fn restore(&mut self, questions: Vec<Round3Question>, current: Option<Uuid>) {
        self.questions = questions
            .into_iter()
            .map(|question| (question.id, question))
            .collect();
        self.current = current.filter(|id| self.questions.contains_key(id));
    }
}
