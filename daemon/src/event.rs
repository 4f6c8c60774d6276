#[derive(Debug)]
pub enum DaemonEvent {
    /// The obs-websocket identify handshake completed; a state sync follows.
    Connected,
    /// OBS reported a source's active state, either as a live
    /// `InputActiveStateChanged` event or as a `GetSourceActive` response.
    SourceActiveChanged { source: String, active: bool },
    /// The websocket dropped; the client is backing off before reconnecting.
    /// All tally lights are cleared until the next sync.
    Disconnected,
    /// The reconnect schedule is exhausted; the daemon must exit non-zero.
    RetriesExhausted,
    /// Ctrl+C received; clear the lights and exit.
    Shutdown,
}
