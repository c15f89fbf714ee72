//! K3DRV line protocol
//!
//! Every datagram is one comma-separated ASCII line with a fixed `$K3DRV`
//! preamble and no trailing delimiter:
//!
//! | Direction | Message |
//! |-----------|---------|
//! | client → control | `$K3DRV,REQ,INIT` |
//! | control → client | `$K3DRV,RES,INIT` |
//! | client → control | `$K3DRV,REQ,CTRL,<R>,<L>` |
//! | control → client | `$K3DRV,CTRL,RES` |
//! | client → data | `$K3DRV,REQ,DATA` |
//! | data → client | `$K3DRV,RES,DATA,IR,11,<ir0..ir10>,ENC,2,<encR>,<encL>` |
//!
//! Requests that fail to decode are never answered; the peer sees silence.

pub mod codec;

pub use codec::{
    ENCODER_CHANNELS, IR_CHANNELS, MAX_DATAGRAM_SIZE, ParseError, Request, Response, decode,
    encode,
};
