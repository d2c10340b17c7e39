//! Private bidirectional channels between the supervisor and its workers.
//!
//! A channel is a connected `AF_UNIX` stream socket pair. One end stays with the
//! supervisor and is driven by the tokio reactor; the other end is handed to a
//! worker as its standard input, output, and error at once.
//!
//! ## Contents
//! - [`pair`] creates a channel and returns both typed ends
//! - [`SupervisorEnd`], [`WorkerEnd`] the two halves
//! - [`LineCodec`], [`Line`] the bounded buffered-read cursor used on every stream
//!
//! ```text
//!   pair() ──► (SupervisorEnd, WorkerEnd)
//!                   │               │
//!                   │               └─► into_stdio() ─► dup ×3 ─► child fd 0/1/2
//!                   └─► into_async() ─► tokio UnixStream (readiness + try_read)
//! ```

mod codec;
mod endpoint;

pub use codec::{Line, LineCodec};
pub use endpoint::{SupervisorEnd, WorkerEnd, WorkerStdio, pair};
