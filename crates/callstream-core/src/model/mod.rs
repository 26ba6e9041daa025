//! Domain data model: party identities, the event sum type, and the
//! per-call state tracked by the Persister and Media Router.

mod call;
mod event;
mod live_call;
mod party;

pub use call::{Call, CallKind};
pub use event::{
    CallAction, Event, GroupCallAction, PayloadKind, ReceivedAt, ReleaseCause, StreamOriginator,
    TalkingParty,
};
pub use live_call::{Feeder, LiveCall, Player, Pool};
pub use party::{Number, PartyIdentity, Tsi};
