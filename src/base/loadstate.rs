/// The current state of a proxy resolution request.
/// This roughly matches the PAC subset of net/base/load_states.h
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// The request is idle.
    #[default]
    Idle,

    /// Downloading the PAC script.
    DownloadingPacFile,

    /// Running the PAC script for the URL.
    ResolvingProxyForUrl,

    /// The PAC script is waiting on a DNS lookup.
    ResolvingHostInPacFile,
}
