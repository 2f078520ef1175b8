//! Ordered, append-only chat history.
//!
//! Only the most recently appended assistant turn can change after it is
//! appended. Writes go through a [`TurnHandle`], which must designate the last
//! turn, so the single in-flight answer is the only mutable entry.

use crate::error::{ChatError, CoreResult};
use crate::model::{ChatMessage, Role, TurnId};

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub text: String,
}

/// Reference to an appended turn: position plus identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnHandle {
    index: usize,
    id: TurnId,
}

impl TurnHandle {
    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Default, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_turn(&mut self, role: Role, text: impl Into<String>) -> TurnHandle {
        let id = TurnId::new();
        self.turns.push(Turn {
            id,
            role,
            text: text.into(),
        });
        TurnHandle {
            index: self.turns.len() - 1,
            id,
        }
    }

    /// Append the user's question and an empty assistant turn together.
    pub fn append_exchange(&mut self, question: impl Into<String>) -> (TurnHandle, TurnHandle) {
        let user = self.append_turn(Role::User, question);
        let assistant = self.append_turn(Role::Assistant, String::new());
        (user, assistant)
    }

    pub fn append_delta_to_last(&mut self, delta: &str) -> CoreResult<()> {
        let last = self.open_last()?;
        last.text.push_str(delta);
        Ok(())
    }

    /// Replace the text of the in-progress assistant turn.
    pub fn set_text(&mut self, handle: TurnHandle, text: impl Into<String>) -> CoreResult<()> {
        self.check_handle(handle)?;
        let last = self.open_last()?;
        last.text = text.into();
        Ok(())
    }

    /// Append to the in-progress assistant turn through its handle.
    pub fn append_delta(&mut self, handle: TurnHandle, delta: &str) -> CoreResult<()> {
        self.check_handle(handle)?;
        self.append_delta_to_last(delta)
    }

    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn get(&self, handle: TurnHandle) -> Option<&Turn> {
        self.turns
            .get(handle.index)
            .filter(|turn| turn.id == handle.id)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Full request history: system prompt, every existing turn, then the new question.
    pub fn request_messages(&self, system_prompt: &str, question: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 2);
        messages.push(ChatMessage::new(Role::System, system_prompt));
        messages.extend(
            self.turns
                .iter()
                .map(|turn| ChatMessage::new(turn.role, turn.text.clone())),
        );
        messages.push(ChatMessage::new(Role::User, question));
        messages
    }

    fn open_last(&mut self) -> CoreResult<&mut Turn> {
        match self.turns.last_mut() {
            None => Err(ChatError::Invariant("conversation is empty".into())),
            Some(turn) if turn.role != Role::Assistant => Err(ChatError::Invariant(format!(
                "last turn has role '{}', expected 'assistant'",
                turn.role.as_str()
            ))),
            Some(turn) => Ok(turn),
        }
    }

    fn check_handle(&self, handle: TurnHandle) -> CoreResult<()> {
        let is_last = handle.index + 1 == self.turns.len()
            && self.turns[handle.index].id == handle.id;
        if is_last {
            Ok(())
        } else {
            Err(ChatError::Invariant(format!(
                "turn {} is not the last turn",
                handle.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_appends_user_then_empty_assistant() {
        let mut conv = Conversation::new();
        let (user, assistant) = conv.append_exchange("¿Qué es la fiebre?");
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.get(user).unwrap().role, Role::User);
        let a = conv.get(assistant).unwrap();
        assert_eq!(a.role, Role::Assistant);
        assert!(a.text.is_empty());
        assert_ne!(user.id(), assistant.id());
    }

    #[test]
    fn deltas_accumulate_on_last_assistant_turn() {
        let mut conv = Conversation::new();
        conv.append_exchange("hola");
        conv.append_delta_to_last("Fie").unwrap();
        conv.append_delta_to_last("bre").unwrap();
        assert_eq!(conv.last().unwrap().text, "Fiebre");
        assert_eq!(conv.turns()[0].text, "hola");
    }

    #[test]
    fn append_delta_on_empty_is_invariant_error() {
        let mut conv = Conversation::new();
        let err = conv.append_delta_to_last("x").unwrap_err();
        assert!(matches!(err, ChatError::Invariant(_)));
    }

    #[test]
    fn append_delta_on_user_or_system_is_invariant_error() {
        let mut conv = Conversation::new();
        conv.append_turn(Role::System, "sys");
        assert!(matches!(
            conv.append_delta_to_last("x"),
            Err(ChatError::Invariant(_))
        ));

        conv.append_turn(Role::User, "q");
        assert!(matches!(
            conv.append_delta_to_last("x"),
            Err(ChatError::Invariant(_))
        ));
        assert_eq!(conv.last().unwrap().text, "q");
    }

    #[test]
    fn stale_handle_cannot_write() {
        let mut conv = Conversation::new();
        let (_, first) = conv.append_exchange("uno");
        conv.append_exchange("dos");
        let err = conv.set_text(first, "late").unwrap_err();
        assert!(matches!(err, ChatError::Invariant(_)));
        assert!(conv.append_delta(first, "late").is_err());
        assert!(conv.turns()[1].text.is_empty());
    }

    #[test]
    fn handle_from_before_reset_is_rejected() {
        let mut conv = Conversation::new();
        let (_, old) = conv.append_exchange("uno");
        conv.reset();
        assert!(conv.is_empty());
        conv.append_exchange("dos");
        // same index, different identity
        assert!(conv.set_text(old, "x").is_err());
        assert!(conv.get(old).is_none());
    }

    #[test]
    fn request_messages_frame_history() {
        let mut conv = Conversation::new();
        conv.append_exchange("primera");
        conv.append_delta_to_last("respuesta").unwrap();

        let msgs = conv.request_messages("solo fiebre", "segunda");
        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(msgs[0].content, "solo fiebre");
        assert_eq!(msgs[2].content, "respuesta");
        assert_eq!(msgs[3].content, "segunda");
    }
}
