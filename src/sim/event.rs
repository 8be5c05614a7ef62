/// Events emitted by one resolved move.
/// The front end consumes these for scene changes and HUD messages.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    BlocksMoved { count: usize },
    /// Something is about to land where the player would have stepped.
    PlayerHeld,
    /// Game phase: exit reached or move budget used up. Both can hold at once
    /// when the exit is reached on the last allowed move.
    LevelComplete {
        map: String,
        moves_taken: u32,
        objects_moved: u32,
        moves_exceeded: bool,
        reached_exit: bool,
    },
    /// Menu: the marker reached the start portal carrying a map name.
    StartGame { map: String },
    /// Menu: the player walked into the mapping portal.
    EnterEditor,
    /// Menu: the player walked out through the end portal.
    Quit,
}
