//! The account snapshot returned by login and user-info queries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Snapshot of the authenticated account.
///
/// Field names follow the service's PascalCase JSON (`"ProfileName"`,
/// `"BannedGame"`, ...). Missing fields fall back to their defaults so an
/// older service that omits, say, `AllowedCiv` still yields a usable user.
///
/// The session layer never mutates a `SessionUser` in place; every refresh
/// replaces the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SessionUser {
    /// Account e-mail; the identity the player logs in with.
    pub mail: String,
    pub profile_name: String,
    pub rank: u32,
    pub banned_game: bool,
    pub banned_chat: bool,
    pub is_connected_game_server: bool,
    pub is_connected_custom_chat_server: bool,
    /// Numeric ids of the options (civilizations) this account may pick.
    pub allowed_civ: Vec<u32>,
}

impl SessionUser {
    /// Which services this account is banned from.
    pub fn ban_status(&self) -> Services {
        Services::from_flags(self.banned_game, self.banned_chat)
    }

    /// Which services this account currently has a live connection to.
    pub fn server_presence(&self) -> Services {
        Services::from_flags(
            self.is_connected_game_server,
            self.is_connected_custom_chat_server,
        )
    }
}

/// A combination of the game server and the chat server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Services {
    None,
    Game,
    Chat,
    GameAndChat,
}

impl Services {
    /// Folds a pair of game/chat flags into one value.
    pub fn from_flags(game: bool, chat: bool) -> Self {
        match (game, chat) {
            (false, false) => Self::None,
            (true, false) => Self::Game,
            (false, true) => Self::Chat,
            (true, true) => Self::GameAndChat,
        }
    }
}

impl fmt::Display for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Game => "game",
            Self::Chat => "chat",
            Self::GameAndChat => "game and chat",
        })
    }
}
