/// Errors produced by the toolkit.
///
/// Transport errors other than the codes the toolkit handles in place
/// (EINTR retries, EAGAIN pass-through, termination mapping) are
/// carried through unchanged in [`Error::Transport`].
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// The socket handle is already registered.
    #[display("socket is already registered")]
    SocketAlreadyRegistered,

    /// Every timer id value is taken by a live timer.
    #[display("no free timer id left after wraparound")]
    TimerIdsExhausted,

    /// The actor was asked to start a second time.
    #[display("actor is already started")]
    ActorAlreadyStarted,

    /// The actor body reported failure before becoming ready.
    #[display("actor initialization failed")]
    ActorInitFailed,

    /// The actor body panicked before becoming ready.
    #[display("actor body panicked: {0}")]
    ActorPanicked(String),

    /// The parent socket closed before any initialization signal.
    #[display("no initialization signal received from the actor")]
    NoInitSignal,

    /// Transport error passed through from the underlying library.
    #[from]
    #[display("{0}")]
    Transport(zmq::Error),
}
