use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Drawer,
    Guesser,
    Spectator,
}

/// A match participant. The display name doubles as the stable identity key,
/// so two players are equal iff their ids match -- role and points do not
/// participate in equality.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub points: u32,
}

impl Player {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            role,
            points: 0,
        }
    }

    pub fn is_drawer(&self) -> bool {
        self.role == Role::Drawer
    }

    pub fn is_guesser(&self) -> bool {
        self.role == Role::Guesser
    }
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// A single guess, snapshotted at submission time. Immutable; lives only for
/// the round it was made in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guess<A> {
    pub id: Uuid,
    pub owner: Player,
    pub value: A,
}

impl<A> Guess<A> {
    pub fn new(owner: Player, value: A) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            value,
        }
    }
}
