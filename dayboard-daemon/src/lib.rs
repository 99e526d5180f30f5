//! Dayboard daemon: live change fan-out + socket server.

mod error;
pub mod fanout;
pub mod listener;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use fanout::{Broadcaster, Listener, ListenerState, PublishReport, SubscriberRegistry};
pub use listener::{stream_events, StreamExit, StreamRecord};
pub use protocol::{
    open_stream, request_set, request_status, request_stop, send_request, DaemonRequest,
    DaemonResponse, EventStream,
};
pub use runtime::{handle_request, run, serve, start_blocking, DaemonState};
