/// All possible actions in the application (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleHelp,
    /// Close whatever overlay or notification is on top
    Dismiss,

    // Channels
    NextChannel,
    PrevChannel,
    SelectChannel(usize),
    RefreshSnapshot,
    Reconnect,

    // Search input
    OpenSearch,
    CloseSearch,
    SearchInput(char),
    SearchBackspace,
    SearchClear,
    ApplyFilter,
    ClearFilter,

    // Level filter
    NextLevel,
    PrevLevel,

    // Scrolling
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollToTop,
    ScrollToBottom,
    PageUp,
    PageDown,
    ToggleFollow,

    // Display toggles
    ToggleTimestamps,
    ToggleLocalTime,
    ToggleSources,
    ToggleDetails,
    ToggleStats,

    ClearView,
    ExportLogs,
}
