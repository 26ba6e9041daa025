//! The four long-lived worker loops: Ingestor, Persister, Media Router, and
//! Tracer. Each owns its private state exclusively and communicates only
//! through the Internal Bus or (Media Router) its control socket.

pub mod ingestor;
pub mod media_router;
pub mod persister;
pub mod tracer;

pub use media_router::{MediaRouterConfig, Reply as MediaRouterReply, Request as MediaRouterRequest};
pub use persister::PersisterConfig;
pub use tracer::{NoopTracePublisher, TracePublisher, TracerConfig, UdpTracePublisher};
