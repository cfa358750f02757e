mod decode_view;
mod painter;
mod session_view;
mod table;
mod value;

pub(crate) use self::decode_view::DecodeView;
pub(crate) use self::painter::Painter;
pub(crate) use self::session_view::{ChunkPlanView, PushLogView, SessionView};
